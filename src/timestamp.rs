/// Formats a millisecond duration as `HH:MM:SS.mmm`; the hour field grows
/// past two digits when needed.
pub fn time_str(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let milliseconds = ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_feature_length() {
        assert_eq!(time_str(0), "00:00:00.000");
        assert_eq!(time_str(7_384_250), "02:03:04.250");
        assert_eq!(time_str(360_000_000), "100:00:00.000");
    }
}

//! Recorded sample streams for offline, deterministic runs.
//!
//! One reading per line: `value[,timestamp_ms[,leads]]`. Missing timestamps
//! are derived from the sample rate; missing lead status means connected.
//! Blank lines and lines starting with `#` are ignored.

use crate::config::SamplingConfig;
use crate::sensor::types::SampleReading;
use crate::sensor::SensorError;
use std::io::BufRead;
use std::path::Path;

/// A parsed recording.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    readings: Vec<SampleReading>,
}

impl ReplaySource {
    /// Parse a recording file.
    pub fn from_path(path: &Path, sampling: &SamplingConfig) -> Result<Self, SensorError> {
        let file = std::fs::File::open(path).map_err(|e| SensorError::Io(e.to_string()))?;
        Self::from_reader(std::io::BufReader::new(file), sampling)
    }

    /// Parse a recording from any buffered reader.
    pub fn from_reader<R: BufRead>(
        reader: R,
        sampling: &SamplingConfig,
    ) -> Result<Self, SensorError> {
        let adc = sampling.adc();
        let mut readings = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| SensorError::Io(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split(',').map(str::trim);
            let value = parse_field::<i64>(fields.next(), line_no, "value")?
                .ok_or_else(|| parse_error(line_no, "missing value"))?;
            let timestamp_ms = parse_field::<u64>(fields.next(), line_no, "timestamp")?
                .unwrap_or_else(|| sampling.timestamp_ms(readings.len() as u64));
            let leads_connected = match fields.next() {
                None | Some("") => true,
                Some(flag) => parse_leads(flag).ok_or_else(|| {
                    parse_error(line_no, &format!("invalid lead status '{flag}'"))
                })?,
            };

            if let Some(previous) = readings.last().map(|r: &SampleReading| r.timestamp_ms) {
                if timestamp_ms < previous {
                    return Err(parse_error(line_no, "timestamps must not decrease"));
                }
            }

            readings.push(SampleReading {
                value: adc.clamp(value),
                leads_connected,
                timestamp_ms,
            });
        }

        Ok(Self { readings })
    }

    pub fn readings(&self) -> &[SampleReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Span covered by the recording in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        match (self.readings.first(), self.readings.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0,
        }
    }
}

impl IntoIterator for ReplaySource {
    type Item = SampleReading;
    type IntoIter = std::vec::IntoIter<SampleReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.into_iter()
    }
}

fn parse_field<T: std::str::FromStr>(
    field: Option<&str>,
    line: usize,
    name: &str,
) -> Result<Option<T>, SensorError> {
    match field {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| parse_error(line, &format!("invalid {name} '{text}'"))),
    }
}

fn parse_leads(flag: &str) -> Option<bool> {
    match flag.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "connected" => Some(true),
        "0" | "false" | "off" | "disconnected" => Some(false),
        _ => None,
    }
}

fn parse_error(line: usize, message: &str) -> SensorError {
    SensorError::Parse {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ReplaySource, SensorError> {
        ReplaySource::from_reader(text.as_bytes(), &SamplingConfig::default())
    }

    #[test]
    fn test_values_only_use_sample_clock() {
        let source = parse("100\n200\n300\n").unwrap();
        let stamps: Vec<u64> = source.readings().iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 2, 4]);
        assert!(source.readings().iter().all(|r| r.leads_connected));
        assert_eq!(source.duration_ms(), 4);
    }

    #[test]
    fn test_clock_follows_configured_rate() {
        let sampling = SamplingConfig {
            sample_rate_hz: 250,
            adc_resolution_bits: 10,
            ..SamplingConfig::default()
        };
        let source = ReplaySource::from_reader("100\n2000\n".as_bytes(), &sampling).unwrap();
        assert_eq!(source.readings()[1].timestamp_ms, 4);
        // 10-bit converter tops out at 1023
        assert_eq!(source.readings()[1].value, 1023);
    }

    #[test]
    fn test_full_rows_and_comments() {
        let source = parse("# value,ms,leads\n\n3000,0,1\n0, 200 ,true\n4095,400,off\n").unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.readings()[1].timestamp_ms, 200);
        assert!(!source.readings()[2].leads_connected);
    }

    #[test]
    fn test_values_clamped_to_adc_range() {
        let source = parse("-5\n9000\n").unwrap();
        assert_eq!(source.readings()[0].value, 0);
        assert_eq!(source.readings()[1].value, 4095);
    }

    #[test]
    fn test_parse_errors_report_line() {
        match parse("100\nabc\n") {
            Err(SensorError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(matches!(
            parse("1,0,maybe"),
            Err(SensorError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            parse("1,10\n1,5"),
            Err(SensorError::Parse { line: 2, .. })
        ));
    }
}

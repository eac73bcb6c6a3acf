/// Number of scan parameters this client understands. Firmware may send more; the rest are skipped.
pub const NUMBER_OF_SCAN_PARAMETER: usize = 10;

/// Maximum number of points per scan.
pub const MAX_POINTS_PER_SCAN: usize = 4000;

/// Maximum number of echoes per point.
pub const MAX_NUMBER_OF_ECHOES: usize = 4;

// Scan parameter block, transmitted in exactly this order

/// Index of the scan number.
pub const PARAMETER_SCAN_NUMBER: usize = 0;
/// Index of the sensor time stamp in milliseconds.
pub const PARAMETER_TIME_STAMP: usize = 1;
/// Index of the scan start direction.
pub const PARAMETER_SCAN_START_DIRECTION: usize = 2;
/// Index of the scan angle.
pub const PARAMETER_SCAN_ANGLE: usize = 3;
/// Index of the number of echoes. 0 means only the master echo is transferred.
pub const PARAMETER_NUMBER_OF_ECHOES: usize = 4;
/// Index of the incremental encoder value.
pub const PARAMETER_INCREMENTAL_ENCODER: usize = 5;
/// Index of the sensor temperature.
pub const PARAMETER_TEMPERATURE: usize = 6;
/// Index of the system status.
pub const PARAMETER_SYSTEM_STATUS: usize = 7;
/// Index of the data content code, see `DataContent`.
pub const PARAMETER_DATA_CONTENT: usize = 8;
/// Index of the scan line.
pub const PARAMETER_SCAN_LINE: usize = 9;

/// Distance reported when no echo was received.
pub const DISTANCE_NO_ECHO: i32 = i32::MIN;

/// Distance reported when the signal was rejected as noise or saturated.
pub const DISTANCE_NOISE: i32 = i32::MAX;

/// Scale from raw distance units to meters.
pub const DISTANCE_UNIT_M: f64 = 0.0001;

/// Scale from raw time stamp units to seconds.
pub const TIME_STAMP_UNIT_S: f64 = 0.001;

/// Value, limits and description of one sensor parameter, as answered to `GPIN`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterInfo {
    /// The parameter ID.
    pub id: i32,
    /// Current value.
    pub value: i32,
    /// Smallest accepted value.
    pub min: i32,
    /// Largest accepted value.
    pub max: i32,
    /// Human readable description.
    pub info: String,
}

/// Layout of the data block of a scan, selected by `PARAMETER_DATA_CONTENT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataContent {
    /// No data block.
    NoDataBlock,
    /// One distance word per sample.
    Distances,
    /// Distance and pulse width per sample.
    DistancesPulseWidth,
    /// Distance and pulse width per sample, echo number included.
    DistancesPulseWidthWithEcho,
    /// Unknown code; read like `DistancesPulseWidth`.
    Other(i32),
}

impl DataContent {
    /// Converts a data content code into a `DataContent`.
    pub fn from_code(code: i32) -> DataContent {
        match code {
            0 => DataContent::NoDataBlock,
            4 => DataContent::Distances,
            8 => DataContent::DistancesPulseWidth,
            7 => DataContent::DistancesPulseWidthWithEcho,
            other => DataContent::Other(other),
        }
    }

    /// Returns the wire code.
    pub fn code(self) -> i32 {
        match self {
            DataContent::NoDataBlock => 0,
            DataContent::Distances => 4,
            DataContent::DistancesPulseWidth => 8,
            DataContent::DistancesPulseWidthWithEcho => 7,
            DataContent::Other(code) => code,
        }
    }

    /// Number of 32-bit words per sample in the data block.
    pub fn words_per_sample(self) -> usize {
        match self {
            DataContent::NoDataBlock => 0,
            DataContent::Distances => 1,
            _ => 2,
        }
    }

    /// Returns `true` if samples carry a pulse width.
    #[inline]
    pub fn has_pulse_width(self) -> bool {
        self.words_per_sample() == 2
    }
}

/// One echo of one point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ScanSample {
    /// Raw distance, see `DISTANCE_NO_ECHO` and `DISTANCE_NOISE`.
    pub distance: i32,
    /// Raw pulse width, 0 when the data block carries distances only.
    pub pulse_width: i32,
}

impl ScanSample {
    pub fn new(distance: i32, pulse_width: i32) -> ScanSample {
        ScanSample {
            distance,
            pulse_width,
        }
    }

    #[inline]
    pub fn is_no_echo(&self) -> bool {
        self.distance == DISTANCE_NO_ECHO
    }

    #[inline]
    pub fn is_noise(&self) -> bool {
        self.distance == DISTANCE_NOISE
    }

    /// Returns `true` if the distance is a measurement and not a sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.is_no_echo() && !self.is_noise()
    }
}

/// Samples of one point, one slot per possible echo.
pub type PointSamples = [ScanSample; MAX_NUMBER_OF_ECHOES];

/// One measurement sweep as answered to `GSCN` or `GSC2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Number of valid entries in `parameter`.
    pub number_of_parameter: usize,
    /// Scan parameter block, see the `PARAMETER_*` indices.
    pub parameter: [i32; NUMBER_OF_SCAN_PARAMETER],
    /// Number of points.
    pub number_of_points: usize,
    /// Number of echoes per point, at least 1 for a parsed scan.
    pub number_of_echoes: usize,
    /// Samples, one entry per point.
    pub data: Vec<PointSamples>,
}

impl Default for Scan {
    fn default() -> Scan {
        Scan::new()
    }
}

impl Scan {
    /// Creates an empty scan.
    pub fn new() -> Scan {
        Scan {
            number_of_parameter: 0,
            parameter: [0; NUMBER_OF_SCAN_PARAMETER],
            number_of_points: 0,
            number_of_echoes: 0,
            data: Vec::new(),
        }
    }

    /// Resets the scan to the empty state.
    pub fn clear(&mut self) {
        self.number_of_parameter = 0;
        self.parameter = [0; NUMBER_OF_SCAN_PARAMETER];
        self.number_of_points = 0;
        self.number_of_echoes = 0;
        self.data.clear();
    }

    /// Returns `true` if the scan is cleared and holds no parsed answer.
    ///
    /// A parsed scan always has at least one echo per point, even when the
    /// firmware sends no parameters or no points.
    pub fn is_empty(&self) -> bool {
        self.number_of_echoes == 0
    }

    pub fn scan_number(&self) -> i32 {
        self.parameter[PARAMETER_SCAN_NUMBER]
    }

    pub fn time_stamp(&self) -> i32 {
        self.parameter[PARAMETER_TIME_STAMP]
    }

    /// Sensor time stamp in seconds.
    pub fn timestamp_s(&self) -> f64 {
        f64::from(self.time_stamp()) * TIME_STAMP_UNIT_S
    }

    pub fn data_content(&self) -> DataContent {
        DataContent::from_code(self.parameter[PARAMETER_DATA_CONTENT])
    }

    /// Returns the echoes of `point`, or `None` if the point does not exist.
    pub fn samples(&self, point: usize) -> Option<&[ScanSample]> {
        self.data
            .get(point)
            .map(|samples| &samples[..self.number_of_echoes])
    }

    /// Distance of one echo in meters, `None` for a missing or sentinel sample.
    pub fn distance_m(&self, point: usize, echo: usize) -> Option<f64> {
        let sample = self.samples(point)?.get(echo)?;
        if sample.is_valid() {
            Some(f64::from(sample.distance) * DISTANCE_UNIT_M)
        } else {
            None
        }
    }
}

/// Sample counts of one scan, plus the scans lost since the previous one.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    pub valid: usize,
    pub no_echo: usize,
    pub noise: usize,
    /// Scans skipped between the previous scan number and this one.
    pub lost_scans: i64,
}

impl ScanStatistics {
    /// Counts the samples of `scan`.
    ///
    /// # Arguments
    ///
    /// * `scan` - The scan to evaluate.
    /// * `previous_scan_number` - Scan number of the scan received before, if any.
    pub fn from_scan(scan: &Scan, previous_scan_number: Option<i32>) -> ScanStatistics {
        let mut stats = ScanStatistics::default();
        for point in 0..scan.data.len() {
            for sample in scan.samples(point).unwrap_or(&[]) {
                if sample.is_no_echo() {
                    stats.no_echo += 1;
                } else if sample.is_noise() {
                    stats.noise += 1;
                } else {
                    stats.valid += 1;
                }
            }
        }
        if let Some(previous) = previous_scan_number {
            let delta = i64::from(scan.scan_number()) - i64::from(previous) - 1;
            stats.lost_scans = delta.max(0);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_content_codes() {
        assert_eq!(DataContent::from_code(0), DataContent::NoDataBlock);
        assert_eq!(DataContent::from_code(4).words_per_sample(), 1);
        assert!(DataContent::from_code(7).has_pulse_width());
        assert!(DataContent::from_code(8).has_pulse_width());
        assert_eq!(DataContent::from_code(3), DataContent::Other(3));
        assert!(DataContent::Other(3).has_pulse_width());
        assert_eq!(DataContent::Other(3).code(), 3);
    }

    #[test]
    fn sample_classification() {
        assert!(ScanSample::new(DISTANCE_NO_ECHO, 0).is_no_echo());
        assert!(ScanSample::new(DISTANCE_NOISE, 0).is_noise());
        assert!(ScanSample::new(1234, 5).is_valid());
        assert!(!ScanSample::new(DISTANCE_NOISE, 0).is_valid());
    }

    #[test]
    fn scan_accessors_and_statistics() {
        let mut scan = Scan::new();
        scan.number_of_parameter = NUMBER_OF_SCAN_PARAMETER;
        scan.parameter[PARAMETER_SCAN_NUMBER] = 17;
        scan.parameter[PARAMETER_TIME_STAMP] = 2500;
        scan.number_of_points = 2;
        scan.number_of_echoes = 2;
        scan.data = vec![[ScanSample::default(); MAX_NUMBER_OF_ECHOES]; 2];
        scan.data[0][0] = ScanSample::new(12_345, 10);
        scan.data[0][1] = ScanSample::new(DISTANCE_NO_ECHO, 0);
        scan.data[1][0] = ScanSample::new(DISTANCE_NOISE, 0);
        scan.data[1][1] = ScanSample::new(20_000, 3);
        // unused echo slots are not counted
        scan.data[1][2] = ScanSample::new(DISTANCE_NOISE, 0);

        assert_eq!(scan.samples(0).map(|s| s.len()), Some(2));
        assert!(scan.samples(2).is_none());
        assert!((scan.distance_m(0, 0).unwrap() - 1.2345).abs() < 1e-9);
        assert_eq!(scan.distance_m(0, 1), None);
        assert!((scan.timestamp_s() - 2.5).abs() < 1e-9);

        let stats = ScanStatistics::from_scan(&scan, Some(14));
        assert_eq!(stats.valid, 2);
        assert_eq!(stats.no_echo, 1);
        assert_eq!(stats.noise, 1);
        assert_eq!(stats.lost_scans, 2);
        assert_eq!(ScanStatistics::from_scan(&scan, None).lost_scans, 0);

        assert!(!scan.is_empty());
        scan.clear();
        assert!(scan.is_empty());
        assert!(scan.data.is_empty());
    }
}

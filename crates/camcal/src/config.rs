use crate::error::PipelineError;
use camcal_camera::SolveOptions;
use camcal_chessboard::{ChessboardParams, PatternSize, SubPixParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the pipeline can be tuned with. Loaded from JSON; missing
/// fields take their defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub chessboard: ChessboardParams,
    pub subpix: SubPixParams,
    /// Side length of one board square in the units of the reported
    /// translations.
    pub square_size: f64,
    pub solve: SolveOptions,
    /// Free scaling of the optimal new camera matrix: 0 crops to valid
    /// pixels, 1 keeps every source pixel.
    pub optimal_alpha: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            chessboard: ChessboardParams::default(),
            subpix: SubPixParams::default(),
            square_size: 1.0,
            solve: SolveOptions::default(),
            optimal_alpha: 1.0,
        }
    }
}

impl CalibrationConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&data).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn pattern(&self) -> PatternSize {
        self.chessboard.pattern
    }

    pub fn with_pattern(mut self, pattern: PatternSize) -> Self {
        self.chessboard.pattern = pattern;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "chessboard": {{ "pattern": {{ "rows": 9, "cols": 7 }} }}, "solve": {{ "fix_k3": true }} }}"#
        )
        .expect("write");

        let cfg = CalibrationConfig::load(file.path()).expect("load");
        assert_eq!(cfg.pattern(), PatternSize::new(9, 7));
        assert!(cfg.solve.fix_k3);
        assert!(!cfg.solve.fix_principal_point);
        assert_eq!(cfg.subpix.half_window, 5);
        assert_eq!(cfg.square_size, 1.0);
        assert_eq!(cfg.optimal_alpha, 1.0);
        assert_eq!(cfg.chessboard.max_detection_dim, Some(1600));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write");
        assert!(matches!(
            CalibrationConfig::load(file.path()),
            Err(PipelineError::Config { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let res = CalibrationConfig::load(Path::new("/nonexistent/camcal.json"));
        assert!(matches!(res, Err(PipelineError::Io { .. })));
    }
}

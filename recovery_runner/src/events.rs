//! Event file decoding and per-event outcome checks.
//!
//! Each events line is one JSON object:
//!   {"event": 7, "detectors": {"CEMC": [[bineta, binphi, energy], ...]}}

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::Deserialize;

use tower_recovery::config::RecoveryConfig;
use tower_recovery::core_modules::tower_container::TowerContainer;
use tower_recovery::parallel_pipeline::DetectorOutcome;
use tower_recovery::pipeline::{GridCoord, GridShape, RecoveryStats};

#[derive(Deserialize, Debug)]
struct EventRecord {
    event: u64,
    detectors: HashMap<String, Vec<(u32, u32, f64)>>,
}

/// Turns event lines into per-detector tower stores.
pub struct EventDecoder {
    detectors: HashMap<String, (u8, GridShape)>,
}

impl EventDecoder {
    pub fn new(config: &RecoveryConfig) -> Result<Self> {
        let mut detectors = HashMap::with_capacity(config.detectors.len());
        for detector in &config.detectors {
            detectors.insert(detector.name.clone(), (detector.calo_id, detector.shape()?));
        }
        Ok(Self { detectors })
    }

    /// Decodes one line. Unknown detectors and hits off the detector grid are errors.
    pub fn decode(&self, line: &str) -> Result<(u64, HashMap<String, TowerContainer>)> {
        let record: EventRecord = serde_json::from_str(line)?;

        let mut event = HashMap::with_capacity(record.detectors.len());
        for (name, hits) in record.detectors {
            let Some(&(calo_id, shape)) = self.detectors.get(&name) else {
                bail!("event {} references unknown detector {}", record.event, name);
            };
            let mut towers = TowerContainer::new(calo_id);
            for (bineta, binphi, energy) in hits {
                let coord = GridCoord::new(bineta, binphi);
                if !shape.contains(coord) {
                    bail!(
                        "event {}: {} hit ({}, {}) outside {}x{} grid",
                        record.event,
                        name,
                        bineta,
                        binphi,
                        shape.eta_bins(),
                        shape.phi_bins()
                    );
                }
                towers.set_at(coord, energy)?;
            }
            event.insert(name, towers);
        }
        Ok((record.event, event))
    }
}

/// Stats per detector, sorted by name. Any failed detector ends the run.
pub fn check_outcomes(
    event: u64,
    outcomes: &HashMap<String, DetectorOutcome>,
) -> Result<Vec<(String, RecoveryStats)>> {
    let mut names: Vec<_> = outcomes.keys().cloned().collect();
    names.sort();

    let mut checked = Vec::with_capacity(names.len());
    for name in names {
        match &outcomes[&name].result {
            Ok(stats) => checked.push((name, *stats)),
            Err(err) => bail!("event {}: detector {} aborted the run: {}", event, name, err),
        }
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_recovery::RecoveryError;

    const CONFIG: &str = r#"
[[detectors]]
name = "CEMC"
calo_id = 1
eta_bins = 4
phi_bins = 4
dead_towers = [[2, 2]]

[[detectors]]
name = "HCALOUT"
calo_id = 2
eta_bins = 4
phi_bins = 4
"#;

    fn decoder() -> EventDecoder {
        EventDecoder::new(&RecoveryConfig::from_toml_str(CONFIG).unwrap()).unwrap()
    }

    fn outcome(result: Result<RecoveryStats, RecoveryError>) -> DetectorOutcome {
        DetectorOutcome {
            towers: TowerContainer::new(1),
            result,
        }
    }

    #[test]
    fn valid_line_builds_one_store_per_detector() {
        let line = r#"{"event": 7, "detectors": {"CEMC": [[1, 1, 10.0], [1, 2, 20.0]], "HCALOUT": [[3, 3, 1.5]]}}"#;

        let (event, stores) = decoder().decode(line).unwrap();

        assert_eq!(event, 7);
        assert_eq!(stores.len(), 2);
        let cemc = &stores["CEMC"];
        assert_eq!(cemc.calo_id(), 1);
        assert_eq!(cemc.get_at(GridCoord::new(1, 2)), Some(20.0));
        assert_eq!(stores["HCALOUT"].calo_id(), 2);
        assert_eq!(stores["HCALOUT"].get_at(GridCoord::new(3, 3)), Some(1.5));
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(decoder().decode(r#"{"event": 7, "detectors": {"CEMC": [[1, 1]]}}"#).is_err());
        assert!(decoder().decode("not json").is_err());
    }

    #[test]
    fn unknown_detector_is_an_error() {
        let err = decoder()
            .decode(r#"{"event": 3, "detectors": {"FEMC": [[0, 0, 1.0]]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown detector FEMC"));
    }

    #[test]
    fn hit_outside_grid_is_an_error() {
        // (4097, 1) would land on (1, 1) if the index were truncated to the key field.
        let err = decoder()
            .decode(r#"{"event": 4, "detectors": {"CEMC": [[1, 1, 10.0], [4097, 1, 99.0]]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("(4097, 1)"));

        let err = decoder()
            .decode(r#"{"event": 4, "detectors": {"CEMC": [[4, 0, 1.0]]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("outside 4x4 grid"));
    }

    #[test]
    fn outcomes_are_reported_in_name_order() {
        let mut outcomes = HashMap::new();
        let cemc = RecoveryStats {
            recovered_energy: 20.0,
            recovered_towers: 1,
        };
        outcomes.insert("HCALOUT".to_string(), outcome(Ok(RecoveryStats::default())));
        outcomes.insert("CEMC".to_string(), outcome(Ok(cemc)));

        let checked = check_outcomes(1, &outcomes).unwrap();

        assert_eq!(
            checked,
            vec![
                ("CEMC".to_string(), cemc),
                ("HCALOUT".to_string(), RecoveryStats::default()),
            ]
        );
    }

    #[test]
    fn aborting_detector_ends_the_run() {
        let mut outcomes = HashMap::new();
        outcomes.insert("CEMC".to_string(), outcome(Ok(RecoveryStats::default())));
        outcomes.insert("HCALOUT".to_string(), outcome(Err(RecoveryError::RunAborted)));

        let err = check_outcomes(9, &outcomes).unwrap_err();
        assert!(err.to_string().contains("detector HCALOUT aborted the run"));
    }
}

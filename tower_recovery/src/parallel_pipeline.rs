// THEORY:
// The `DetectorPool` runs several detectors side by side. Each detector gets its own
// actor task that owns its `RecoveryPipeline` outright; the only way in is a message
// carrying that detector's tower store for one event, and the store comes back on a
// oneshot reply together with the cycle result.
//
// Within a detector, cycles are processed strictly in the order they are sent, so
// the single-threaded contract of `RecoveryPipeline` holds. Across detectors, an
// event's containers are dispatched together and joined.

use crate::config::RecoveryConfig;
use crate::core_modules::tower_container::TowerContainer;
use crate::error::RecoveryError;
use crate::pipeline::{RecoveryPipeline, RecoveryStats};
use futures::future::join_all;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

const ACTOR_QUEUE_DEPTH: usize = 16;

/// Result of one detector's cycle, with its container handed back.
#[derive(Debug)]
pub struct DetectorOutcome {
    pub towers: TowerContainer,
    pub result: Result<RecoveryStats, RecoveryError>,
}

/// Message type for detector actors
enum DetectorMessage {
    Cycle(TowerContainer, oneshot::Sender<DetectorOutcome>),
    Shutdown,
}

pub struct DetectorPool {
    actors: HashMap<String, mpsc::Sender<DetectorMessage>>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl DetectorPool {
    /// Spawns one actor per pipeline. Must be called inside a tokio runtime.
    pub fn new(pipelines: Vec<RecoveryPipeline>) -> Self {
        let mut actors = HashMap::with_capacity(pipelines.len());
        let mut workers = Vec::with_capacity(pipelines.len());

        for mut pipeline in pipelines {
            let (tx, mut rx) = mpsc::channel::<DetectorMessage>(ACTOR_QUEUE_DEPTH);
            actors.insert(pipeline.detector().to_string(), tx);

            let worker = tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    match msg {
                        DetectorMessage::Cycle(mut towers, reply) => {
                            let result = pipeline.run_one_cycle(&mut towers);
                            let _ = reply.send(DetectorOutcome { towers, result });
                        }
                        DetectorMessage::Shutdown => break,
                    }
                }
            });
            workers.push(worker);
        }

        Self { actors, workers }
    }

    pub fn from_config(config: &RecoveryConfig) -> Result<Self, RecoveryError> {
        let pipelines = config
            .detectors
            .iter()
            .map(|detector| detector.build_pipeline())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pipelines))
    }

    pub fn detectors(&self) -> impl Iterator<Item = &str> {
        self.actors.keys().map(String::as_str)
    }

    /// Runs one cycle on every detector present in `event`.
    /// Fails before dispatching anything if a detector name is unknown.
    pub async fn process_event(
        &self,
        event: HashMap<String, TowerContainer>,
    ) -> Result<HashMap<String, DetectorOutcome>, RecoveryError> {
        if let Some(unknown) = event.keys().find(|name| !self.actors.contains_key(*name)) {
            return Err(RecoveryError::UnknownDetector(unknown.clone()));
        }

        let pending = event.into_iter().map(|(name, towers)| async move {
            let outcome = self.dispatch(&name, towers).await;
            (name, outcome)
        });

        let mut outcomes = HashMap::new();
        for (name, outcome) in join_all(pending).await {
            outcomes.insert(name, outcome?);
        }
        Ok(outcomes)
    }

    async fn dispatch(&self, name: &str, towers: TowerContainer) -> Result<DetectorOutcome, RecoveryError> {
        let actor = self
            .actors
            .get(name)
            .ok_or_else(|| RecoveryError::UnknownDetector(name.to_string()))?;
        let (reply, outcome) = oneshot::channel();

        actor
            .send(DetectorMessage::Cycle(towers, reply))
            .await
            .map_err(|_| RecoveryError::ActorGone(name.to_string()))?;
        outcome.await.map_err(|_| RecoveryError::ActorGone(name.to_string()))
    }

    /// Stops every actor and waits for it to exit.
    pub async fn shutdown(self) {
        for tx in self.actors.values() {
            let _ = tx.send(DetectorMessage::Shutdown).await;
        }
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::dead_map::DeadTowerMap;
    use crate::core_modules::geometry::GeometryContainer;
    use crate::pipeline::{GridCoord, GridShape};

    fn pipeline(name: &str, calo_id: u8, with_dead_map: bool) -> RecoveryPipeline {
        let geometry = GeometryContainer::full_grid(calo_id, GridShape::new(4, 4).unwrap());
        let dead_map = with_dead_map.then(|| {
            let mut dead_map = DeadTowerMap::new(calo_id);
            dead_map.add_dead_tower(GridCoord::new(2, 2)).unwrap();
            dead_map
        });
        RecoveryPipeline::new(name, Some(geometry), dead_map).unwrap()
    }

    fn readings(calo_id: u8) -> TowerContainer {
        let mut towers = TowerContainer::new(calo_id);
        towers.set_at(GridCoord::new(1, 1), 10.0).unwrap();
        towers.set_at(GridCoord::new(1, 2), 20.0).unwrap();
        towers.set_at(GridCoord::new(2, 1), 30.0).unwrap();
        towers
    }

    #[tokio::test]
    async fn event_is_processed_per_detector() {
        let pool = DetectorPool::new(vec![pipeline("CEMC", 1, true), pipeline("HCALIN", 2, false)]);

        let mut event = HashMap::new();
        event.insert("CEMC".to_string(), readings(1));
        event.insert("HCALIN".to_string(), readings(2));
        let outcomes = pool.process_event(event).await.unwrap();

        let cemc = &outcomes["CEMC"];
        let stats = cemc.result.as_ref().unwrap();
        assert_eq!(stats.recovered_towers, 1);
        assert!((cemc.towers.get_at(GridCoord::new(2, 2)).unwrap() - 20.0).abs() < 1e-9);

        let hcal = &outcomes["HCALIN"];
        assert_eq!(hcal.result.as_ref().unwrap().recovered_towers, 0);
        assert_eq!(hcal.towers, readings(2));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_detector_is_rejected() {
        let pool = DetectorPool::new(vec![pipeline("CEMC", 1, true)]);

        let mut event = HashMap::new();
        event.insert("FEMC".to_string(), readings(1));
        let err = pool.process_event(event).await.unwrap_err();

        assert!(matches!(err, RecoveryError::UnknownDetector(name) if name == "FEMC"));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn abort_persists_across_events() {
        let mut dead_map = DeadTowerMap::new(1);
        dead_map.add_dead_tower(GridCoord::new(9, 9)).unwrap();
        let geometry = GeometryContainer::full_grid(1, GridShape::new(4, 4).unwrap());
        let broken = RecoveryPipeline::new("CEMC", Some(geometry), Some(dead_map)).unwrap();
        let pool = DetectorPool::new(vec![broken]);

        for expect_first in [true, false] {
            let mut event = HashMap::new();
            event.insert("CEMC".to_string(), readings(1));
            let outcomes = pool.process_event(event).await.unwrap();
            let result = &outcomes["CEMC"].result;
            if expect_first {
                assert!(matches!(result, Err(RecoveryError::UnknownDeadTower { .. })));
            } else {
                assert!(matches!(result, Err(RecoveryError::RunAborted)));
            }
        }
        pool.shutdown().await;
    }
}

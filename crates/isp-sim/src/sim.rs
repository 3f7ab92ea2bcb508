//! Multi-pipeline request loop.
//!
//! One tokio task per pipeline. Each request resolves its stats
//! dependencies against the shared [`PropertyBoard`], picks the 3A values
//! (own algorithm or the peer's published decision), runs the IQ module
//! pipeline, then publishes its own 3A properties.

use crate::board::{PropertyBoard, Publication};
use crate::config::{SimConfig, SimPipelineConfig};
use crate::error::SimError;
use isp_iq::{AecUpdate, AwbUpdate, CmdBuffer, HwContext, IspInputData, ModulePipeline};
use isp_tuning::{StaticTuningManager, TuningManager};
use multi_stats::{
    create_operator, ExecuteProcessRequestData, MultiRequestSync, MultiStatsData,
    MultiStatsOperator, PipelineId, PropertyPair, PropertySource, RequestId, StatsAlgoAction,
    StatsProcessRequestData, StatsProperty,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Properties every pipeline publishes after its frame
const PUBLISHED_PROPERTIES: [StatsProperty; 3] = [
    StatsProperty::AecFrameControl,
    StatsProperty::AwbFrameControl,
    StatsProperty::AfFrameControl,
];

/// Per-pipeline run summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub pipeline_id: PipelineId,
    pub name: String,
    pub frames: u64,
    /// Requests where the local 3A algorithm ran
    pub algo_runs: u64,
    /// Requests that reused the peer's published decision
    pub peer_reused: u64,
    /// Dependencies abandoned after the request timeout
    pub dependency_timeouts: u64,
    /// Requests whose dependency setup was rejected
    pub dependency_errors: u64,
    /// Module recomputations summed over all frames
    pub module_recomputes: u64,
    pub module_failures: u64,
    /// Command buffer dwords emitted over all frames
    pub cmd_dwords: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimReport {
    pub pipelines: Vec<PipelineReport>,
}

impl SimReport {
    pub fn total_failures(&self) -> u64 {
        self.pipelines
            .iter()
            .map(|p| p.module_failures + p.dependency_errors)
            .sum()
    }
}

/// Deterministic scene the local 3A "algorithm" reports for a request
fn local_3a(pipeline_id: PipelineId, request_id: RequestId) -> (AecUpdate, AwbUpdate) {
    let step = (request_id / 10 + pipeline_id as u64) % 8;
    let aec = AecUpdate {
        gain: 1.0 + step as f32 * 2.0,
        exposure_time_ns: 10_000_000 + step * 3_000_000,
        lux_index: 150.0 + step as f32 * 40.0,
    };
    let cct = if (request_id / 20) % 2 == 0 { 5500 } else { 3000 };
    let awb = AwbUpdate {
        cct,
        gains: if cct > 4000 { [1.9, 1.0, 1.5] } else { [1.4, 1.0, 2.2] },
    };
    (aec, awb)
}

fn peer_request_id(request_id: RequestId, offset: i64) -> RequestId {
    if offset >= 0 {
        request_id.saturating_add(offset as u64)
    } else {
        request_id.saturating_sub(offset.unsigned_abs()).max(1)
    }
}

struct PipelineTask {
    sim: SimPipelineConfig,
    pipeline: ModulePipeline,
    operator: Box<dyn MultiStatsOperator>,
    board: Arc<PropertyBoard>,
    tuning: Arc<StaticTuningManager>,
    frames: u64,
    request_timeout: Duration,
}

impl PipelineTask {
    fn id(&self) -> PipelineId {
        self.sim.pipeline.pipeline_id
    }

    fn source_pipeline(&self, source: PropertySource) -> PipelineId {
        match source {
            PropertySource::Local => self.id(),
            PropertySource::Peer(peer) => peer,
        }
    }

    async fn resolve_dependencies(&mut self, stats: &StatsProcessRequestData, report: &mut PipelineReport) {
        let request_id = stats.request_id;
        for dependency in &stats.dependencies {
            let Some(producer) = dependency.resolve(request_id) else {
                self.operator.remove_dependency(dependency, request_id);
                continue;
            };
            let pipeline = self.source_pipeline(dependency.pair.source);
            match self
                .board
                .wait_for(pipeline, dependency.pair.property, producer, self.request_timeout)
                .await
            {
                Some(publication) => {
                    self.operator
                        .on_property_published(dependency.pair, publication.request_id);
                }
                None => {
                    warn!(
                        "Pipeline {} request {}: {:?} of pipeline {} request {} not published in {:?}",
                        self.id(),
                        request_id,
                        dependency.pair.property,
                        pipeline,
                        producer,
                        self.request_timeout
                    );
                    metrics::counter!("isp_sim_dependency_timeouts_total").increment(1);
                    report.dependency_timeouts += 1;
                    self.operator.remove_dependency(dependency, request_id);
                }
            }
        }
    }

    /// Peer decision to reuse when the operator says to skip
    async fn peer_decision(&self, stats: &StatsProcessRequestData) -> Option<Publication> {
        let dependency = stats.peer_dependencies().next()?;
        let pipeline = self.source_pipeline(dependency.pair.source);
        self.board
            .latest(pipeline, StatsProperty::AecFrameControl)
            .await
    }

    async fn run(mut self) -> Result<PipelineReport, SimError> {
        let id = self.id();
        let mut report = PipelineReport {
            pipeline_id: id,
            name: self.sim.pipeline.name.clone(),
            ..Default::default()
        };
        let hw_context = HwContext {
            camera_id: id,
            ife_index: id as u8,
        };
        let mut cmd = CmdBuffer::new(self.sim.pipeline.cmd_buffer_dwords);
        let frame_interval = Duration::from_millis(self.sim.frame_interval_ms);

        for request_id in 1..=self.frames {
            let execute = ExecuteProcessRequestData {
                request_id,
                pipeline_id: id,
                multi_request: self.sim.peer_pipeline_id.map(|peer| MultiRequestSync {
                    peer_pipeline_id: peer,
                    peer_request_id: peer_request_id(request_id, self.sim.peer_request_offset),
                    peer_active: true,
                }),
            };
            let mut stats = StatsProcessRequestData::new(request_id);
            // No flush during a run: request N is N requests past the last flush.
            if let Err(err) = self
                .operator
                .update_stats_dependencies(&execute, &mut stats, request_id)
            {
                warn!("Pipeline {} request {}: {}", id, request_id, err);
                report.dependency_errors += 1;
            }

            self.resolve_dependencies(&stats, &mut report).await;

            let (aec, awb) = match self.operator.get_stats_algo_action() {
                StatsAlgoAction::Skip => match self.peer_decision(&stats).await {
                    Some(peer) => {
                        report.peer_reused += 1;
                        (peer.aec, peer.awb)
                    }
                    None => {
                        report.algo_runs += 1;
                        local_3a(id, request_id)
                    }
                },
                StatsAlgoAction::Run => {
                    report.algo_runs += 1;
                    local_3a(id, request_id)
                }
                StatsAlgoAction::Defer => {
                    warn!("Pipeline {} request {} still deferred, running locally", id, request_id);
                    report.algo_runs += 1;
                    local_3a(id, request_id)
                }
            };

            cmd.reset();
            let (recomputed, failures) = {
                let mut input = IspInputData::new(request_id, &mut cmd);
                input.hw_context = hw_context;
                input.tuning = Some(self.tuning.as_ref() as &dyn TuningManager);
                input.aec = aec;
                input.awb = awb;
                input.hal.crop_window = Some(self.sim.crop_window);
                input.oem = Some(&self.sim.oem);
                input.sensor = self.sim.sensor;
                input.stream = self.sim.stream;
                input.stats_request.hdr_be = Some(self.sim.hdr_be.clone());
                let frame = self.pipeline.execute_frame(&mut input);
                (frame.recomputed.len() as u64, frame.failures.len() as u64)
            };
            report.frames += 1;
            report.module_recomputes += recomputed;
            report.module_failures += failures;
            report.cmd_dwords += cmd.len() as u64;

            let publication = Publication {
                request_id,
                aec,
                awb,
            };
            for property in PUBLISHED_PROPERTIES {
                self.board.publish(id, property, publication).await;
                self.operator
                    .on_property_published(PropertyPair::local(property), request_id);
            }
            debug!(
                "Pipeline {} request {}: {} modules recomputed, {} dwords",
                id,
                request_id,
                recomputed,
                cmd.len()
            );

            tokio::time::sleep(frame_interval).await;
        }

        info!(
            "Pipeline {} done: {} frames, {} algo runs, {} peer reuses, {} timeouts",
            id, report.frames, report.algo_runs, report.peer_reused, report.dependency_timeouts
        );
        Ok(report)
    }
}

/// Run every configured pipeline to completion
pub async fn run_simulation(
    config: &SimConfig,
    tuning: Arc<StaticTuningManager>,
) -> Result<SimReport, SimError> {
    config.validate()?;
    let board = Arc::new(PropertyBoard::new());
    let request_timeout = Duration::from_millis(config.request_timeout_ms);

    let mut tasks = Vec::with_capacity(config.pipelines.len());
    for sim in &config.pipelines {
        let id = sim.pipeline.pipeline_id;
        let mut operator = create_operator(config.strategy);
        operator.initialize(MultiStatsData {
            role: sim.role,
            pipeline_id: id,
            peer_pipeline_id: sim.peer_pipeline_id,
            hw_context: HwContext {
                camera_id: id,
                ife_index: id as u8,
            },
            algo_sync_enabled: sim.algo_sync_enabled,
        })?;
        let task = PipelineTask {
            sim: sim.clone(),
            pipeline: ModulePipeline::new(sim.pipeline.clone())?,
            operator,
            board: board.clone(),
            tuning: tuning.clone(),
            frames: config.frames,
            request_timeout,
        };
        tasks.push(tokio::spawn(task.run()));
    }
    info!(
        "Started {} pipelines ({:?} strategy, {} frames)",
        tasks.len(),
        config.strategy,
        config.frames
    );

    let mut report = SimReport::default();
    for task in tasks {
        let pipeline = task.await.map_err(|e| SimError::Task(e.to_string()))??;
        report.pipelines.push(pipeline);
    }
    Ok(report)
}

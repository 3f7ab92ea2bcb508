use criterion::{black_box, criterion_group, criterion_main, Criterion};
use isp_iq::{CmdBuffer, CropWindow, HdrBeStatsConfig, IspInputData, ModulePipeline, PipelineConfig};
use isp_tuning::{ChromatixModule, ChromatixTree, StaticTuningManager, TriggerAxis, TuningRegion};

fn bench_tuning() -> StaticTuningManager {
    let entries = [
        ("pedestal", TriggerAxis::AecGain, vec![64.0, 64.0, 64.0, 64.0, 0.2]),
        (
            "linearization",
            TriggerAxis::AecGain,
            vec![64.0, 64.0, 64.0, 64.0, 256.0, 512.0, 1024.0, 1536.0, 2048.0, 2560.0, 3072.0, 3584.0],
        ),
        ("demosaic", TriggerAxis::AecGain, vec![0.5, 0.75, 128.0]),
        (
            "color_correction",
            TriggerAxis::ColorTemperature,
            vec![1.5, -0.25, -0.25, -0.25, 1.5, -0.25, -0.25, -0.25, 1.5, 0.0, 0.0, 0.0],
        ),
    ];

    let mut tree = ChromatixTree::new();
    for (name, trigger, params) in entries {
        let high: Vec<f32> = params.iter().map(|p| p * 1.25).collect();
        let module = ChromatixModule {
            enable: true,
            trigger,
            regions: vec![
                TuningRegion { start: 1.0, end: 2.0, params },
                TuningRegion { start: 16.0, end: 10_000.0, params: high },
            ],
        };
        if let Err(err) = tree.insert(name, vec![], module) {
            panic!("bench tuning rejected: {err}");
        }
    }
    StaticTuningManager::new(tree)
}

fn bench_execute_frame(c: &mut Criterion) {
    let tuning = bench_tuning();
    let mut group = c.benchmark_group("pipeline_execute");

    for (label, gains) in [("recompute", [1.5f32, 4.0]), ("skip", [4.0f32, 4.0])] {
        let mut pipeline = match ModulePipeline::new(PipelineConfig::default()) {
            Ok(pipeline) => pipeline,
            Err(err) => panic!("pipeline: {err}"),
        };
        let mut cmd = CmdBuffer::default();
        let mut frame = 0u64;

        group.bench_function(label, |b| {
            b.iter(|| {
                cmd.reset();
                frame += 1;
                let mut input = IspInputData::new(frame, &mut cmd);
                input.tuning = Some(&tuning);
                input.aec.gain = gains[(frame % 2) as usize];
                input.hal.crop_window = Some(CropWindow::new(80, 60, 3840, 2160));
                input.stats_request.hdr_be = Some(HdrBeStatsConfig {
                    roi: CropWindow::new(0, 0, 3840, 2160),
                    horizontal_num: 64,
                    vertical_num: 48,
                    channel_thresholds: [4095; 4],
                });
                black_box(pipeline.execute_frame(&mut input))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_execute_frame);
criterion_main!(benches);

use mic_core::recorder::RecorderBuilder;
use mic_core::{AnalyzerBuilder, FeatureFrame, MonotonicClock, Pipeline, Scheduler};

fn meter(value: f32, width: usize, fill: char) -> String {
    let n = ((value.clamp(0.0, 1.0)) * width as f32) as usize;
    let mut s: String = std::iter::repeat(fill).take(n).collect();
    s.extend(std::iter::repeat(' ').take(width - n));
    s
}

fn main() {
    mic_core::default_config();
    mic_core::default_log();

    let config = match AnalyzerBuilder::new().build() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut pipeline = match Pipeline::new(config, Box::new(RecorderBuilder::new())) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let frames = mic_core::CONFIG.get_or("kick_meter.frames", 0usize);
    let control = pipeline.control();

    pipeline.subscribe(move |frame: &FeatureFrame| {
        log::trace!("Frame: {:7}@{:?}", frame.frame, frame.timestamp);

        if frame.kicked {
            println!(
                "Kick@{:.3}: #{:<5} rms {:6.3}",
                mic_core::helpers::secs(frame.timestamp),
                frame.kick_count,
                frame.rms,
            );
        } else if frame.frame % 4 == 0 {
            println!(
                "[{}] [{}] zcr {:5.3}",
                meter(frame.rms, 40, '#'),
                meter(frame.kick_intensity, 10, '*'),
                frame.zcr,
            );
        }

        if frames != 0 && frame.frame + 1 >= frames {
            control.shutdown();
        }
    });

    if let Some(e) = pipeline.capture_error() {
        log::warn!("Running without audio input: {}", e);
    }

    let scheduler = Scheduler::for_config(pipeline.config());
    let ticks = scheduler.run(&mut pipeline, &mut MonotonicClock::new());
    log::info!("Done after {} frames", ticks);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter() {
        assert_eq!(meter(0.5, 4, '#'), "##  ");
        assert_eq!(meter(2.0, 3, '#'), "###");
        assert_eq!(meter(-1.0, 2, '#'), "  ");
    }
}

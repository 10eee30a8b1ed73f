use std::{
    error::Error,
    fs,
    path::Path,
    time::{Duration, Instant},
};

use log::{info, LevelFilter};
use signal_rl::{
    algo::{
        tabular::{blink_count_for, NUM_ACTIONS},
        SignalAgent, SignalAgentConfig,
    },
    decay,
    exploration::EpsilonGreedy,
    feedback::{BlinkSequencer, Rgba, SequencerConfig},
    gym::{Intersection, IntersectionConfig},
    report::{ActionSource, TrialLog, TrialRecord},
    state::{State, NUM_ARMS},
};

const NUM_EPISODES: u32 = 300;
const FRAME: Duration = Duration::from_millis(33);

/// Drive the sequencer with a simulated 30 fps clock until the signal is done
///
/// **Returns** the number of frames on which the signal was drawn
fn play_signal(sequencer: &mut BlinkSequencer, action: usize) -> u32 {
    let mut now = Instant::now();
    sequencer.activate(Some(blink_count_for(action)), Rgba::WHITE, now);

    let mut lit = 0;
    while sequencer.is_active() {
        now += FRAME;
        if sequencer.query(now).0 {
            lit += 1;
        }
    }
    lit
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder()
        .format_timestamp_secs()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let out = Path::new("demos/out");
    fs::create_dir_all(out)?;
    let checkpoint = out.join("signal_agent.json");

    // explore heavily at first, settle towards mostly greedy signals
    let defaults: SignalAgentConfig = SignalAgentConfig::default();
    let mut agent = SignalAgent::new(SignalAgentConfig {
        exploration: EpsilonGreedy::new(decay::Exponential::new(0.01, 0.5, 0.05)?),
        alpha: defaults.alpha,
        gamma: defaults.gamma,
        grid: defaults.grid,
        max_steps: defaults.max_steps,
        seed: defaults.seed,
    });
    match agent.restore(&checkpoint) {
        Ok(()) => info!("Resuming from episode {}", agent.episode()),
        Err(signal_rl::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No checkpoint at {}, starting fresh", checkpoint.display())
        }
        Err(e) => return Err(e.into()),
    }

    let mut env = Intersection::new(IntersectionConfig::default());
    let mut sequencer = BlinkSequencer::new(SequencerConfig::default());
    let log = TrialLog::new(out.join("trials.csv"));
    let started = Instant::now();

    for _ in 0..NUM_EPISODES {
        let summary = agent.go(&mut env)?;
        let lit = play_signal(&mut sequencer, summary.action);
        log::debug!("Signal {} drawn on {lit} frames", summary.action);

        let record = TrialRecord::from_summary(
            agent.episode(),
            started.elapsed(),
            &summary,
            ActionSource::Agent,
            agent.q_table(),
        )?;
        log.append(&record)?;
    }

    agent.persist(&checkpoint)?;

    for arm in 0..NUM_ARMS {
        let values = agent.q_table().row(State::start(arm));
        info!(
            "Arm {arm}: signal {} of {NUM_ACTIONS}, values {values:?}",
            agent.greedy_action(State::start(arm))
        );
    }

    Ok(())
}

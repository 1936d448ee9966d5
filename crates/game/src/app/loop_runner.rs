use std::process::ExitCode;
use std::time::Duration;

use tracing::info;

use super::bootstrap::AppWiring;
use super::room::RoomOutcome;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Runs the room headless in fixed steps until it is decided or the time
/// limit passes. Simulated time only; nothing sleeps.
pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        mut room,
        step,
        run_limit,
    } = app;
    info!(
        encounter = room.encounter().name(),
        step_ms = step.as_millis() as u64,
        "headless_run_started"
    );

    let mut next_progress_log = PROGRESS_LOG_INTERVAL;
    while room.outcome() == RoomOutcome::InProgress && room.elapsed() < run_limit {
        room.step(step);
        if room.elapsed() >= next_progress_log {
            next_progress_log += PROGRESS_LOG_INTERVAL;
            let counts = room.world().ai_state_counts();
            info!(
                elapsed_s = room.elapsed().as_secs(),
                hostiles = room.hostile_count(),
                projectiles = room.projectiles().len(),
                dialog_open = room.dialogs().is_showing(),
                idle = counts.idle,
                wander = counts.wander,
                chase = counts.chase,
                attack = counts.attack,
                "room_progress"
            );
        }
    }

    let summary = room.summary();
    info!(
        encounter = summary.encounter,
        outcome = %summary.outcome,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        reward = summary.reward,
        player_health = summary.player_health,
        hostiles_left = summary.hostiles_left,
        dialogs_shown = summary.dialogs_shown,
        intents_applied = summary.intents.applied,
        invalid_targets = summary.intents.invalid_target,
        unknown_archetypes = summary.intents.unknown_archetype,
        "run_finished"
    );
    ExitCode::SUCCESS
}

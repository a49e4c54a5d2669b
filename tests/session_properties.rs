//! Session invariants under random seeds and random steering

use std::collections::BTreeSet;

use proptest::prelude::*;

use snowball_stacker::GameConfig;
use snowball_stacker::consts::SIM_DT;
use snowball_stacker::sim::{EntityId, GamePhase, Session, TickInput, tick};

/// Ticks each steering target is held for
const HOLD_TICKS: usize = 45;

#[derive(Debug, Clone)]
struct Observed {
    max_height: u32,
    lives: u8,
    blocks_dropped: u32,
    locked: BTreeSet<EntityId>,
    game_over: bool,
}

impl Observed {
    fn of(session: &Session) -> Self {
        Self {
            max_height: session.max_height,
            lives: session.lives,
            blocks_dropped: session.blocks_dropped,
            locked: session.locked_blocks.clone(),
            game_over: session.is_game_over(),
        }
    }
}

/// Check everything that must hold after any tick, given the previous tick
fn check_invariants(session: &Session, before: &Observed) -> Result<(), TestCaseError> {
    prop_assert_eq!(session.blocks_stacked() as usize, session.stack.len());
    let unique: BTreeSet<_> = session.stack.iter().collect();
    prop_assert_eq!(unique.len(), session.stack.len());

    for id in &session.stack {
        let block = session.blocks.get(id);
        prop_assert!(block.is_some_and(|b| b.landed), "stacked block {:?} not landed", id);
        prop_assert!(session.current_block != Some(*id));
    }

    if let Some(id) = session.current_block {
        prop_assert!(session.blocks.get(&id).is_some_and(|b| !b.landed));
    }
    if session.phase == GamePhase::Dropping {
        prop_assert!(session.current_block.is_some());
    }

    prop_assert!(session.max_height >= session.current_height);
    prop_assert!(session.max_height >= before.max_height);
    prop_assert!(session.lives <= before.lives);
    prop_assert!(session.blocks_dropped >= before.blocks_dropped);
    prop_assert!(before.locked.is_subset(&session.locked_blocks));

    for (id, block) in &session.blocks {
        prop_assert_eq!(block.lock_marker, session.locked_blocks.contains(id));
    }

    if before.game_over {
        prop_assert!(session.is_game_over());
        prop_assert_eq!(session.blocks_dropped, before.blocks_dropped);
        prop_assert!(session.final_stats.is_some());
    }
    Ok(())
}

fn run_checked(
    session: &mut Session,
    inputs: impl Iterator<Item = TickInput>,
) -> Result<(), TestCaseError> {
    for input in inputs {
        let before = Observed::of(session);
        tick(session, &input, SIM_DT);
        check_invariants(session, &before)?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_steered_session_keeps_invariants(
        seed in any::<u64>(),
        targets in prop::collection::vec(0.0f32..800.0, 1..16),
    ) {
        let mut session = Session::new(GameConfig::default(), seed);
        let start = TickInput { start: true, ..Default::default() };
        let steering = targets.into_iter().flat_map(|x| {
            std::iter::repeat_n(
                TickInput { target_x: Some(x), ..Default::default() },
                HOLD_TICKS,
            )
        });
        run_checked(&mut session, std::iter::once(start).chain(steering))?;
    }

    #[test]
    fn prop_autopilot_keeps_invariants(seed in any::<u64>()) {
        let mut session = Session::new(GameConfig::default(), seed);
        let input = TickInput { idle_mode: true, ..Default::default() };
        run_checked(&mut session, std::iter::repeat_n(input, 1200))?;
        prop_assert!(session.has_started());
    }

    #[test]
    fn prop_restart_gives_fresh_session(
        seed in any::<u64>(),
        ticks in 1usize..600,
    ) {
        let mut session = Session::new(GameConfig::default(), seed);
        let input = TickInput { idle_mode: true, ..Default::default() };
        for _ in 0..ticks {
            tick(&mut session, &input, SIM_DT);
        }

        session.restart();
        prop_assert_eq!(session.phase, GamePhase::Idle);
        prop_assert_eq!(session.blocks_dropped, 0);
        prop_assert_eq!(session.max_height, 0);
        prop_assert_eq!(session.lives, session.config.max_lives);
        prop_assert!(session.blocks.is_empty());
        prop_assert!(session.projectiles.is_empty());
        prop_assert!(session.locked_blocks.is_empty());
        prop_assert!(session.timers.is_empty());
        prop_assert!(session.final_stats.is_none());

        // Nothing scheduled before the restart can fire afterwards
        for _ in 0..120 {
            tick(&mut session, &TickInput::default(), SIM_DT);
        }
        prop_assert_eq!(session.phase, GamePhase::Idle);
        prop_assert_eq!(session.blocks_dropped, 0);
    }
}

use super::*;
use arena_engine::{
    compile_def_database, resolve_app_paths, ContentPlanRequest, DamageOutcome,
};

fn defs() -> DefDatabase {
    let paths = resolve_app_paths().expect("app paths");
    compile_def_database(&paths.content_paths(), &ContentPlanRequest::default()).expect("def db")
}

fn manual_room(kind: EncounterKind) -> Room {
    Room::build(kind, &defs(), SimConfig::default(), RoomConfig::default(), false)
        .expect("room")
}

fn children_of(room: &Room, summoner: EntityId) -> Vec<EntityId> {
    room.world()
        .enemies()
        .filter(|enemy| enemy.summoner() == Some(summoner) && enemy.is_alive())
        .map(|enemy| enemy.id())
        .collect()
}

/// Pushes the Hamper King through its only phase change.
fn enter_second_phase(room: &mut Room, boss: EntityId) {
    let outcome = room.world_mut().take_damage(boss, 300.0);
    assert_eq!(
        outcome,
        DamageOutcome::Applied {
            dealt: 240,
            remaining: 360
        }
    );
    room.step(ms(16));
    assert_eq!(room.dialogs().current().map(|dialog| dialog.boss_id), Some(boss));
    assert!(room.acknowledge_dialog());
}

#[test]
fn base_roster_covers_every_movement_strategy() {
    let db = defs();
    assert_eq!(db.len(), 12);
    let movements = db
        .enemy_defs()
        .iter()
        .map(|def| def.archetype.movement.name())
        .collect::<BTreeSet<_>>();
    assert_eq!(
        movements,
        BTreeSet::from([
            "Dash",
            "Diagonal",
            "Direct",
            "EdgePatrol",
            "KeepDistance",
            "Orbit",
            "Zigzag"
        ])
    );
    let lint_guard = db.enemy_archetype_by_name("lint_guard").expect("lint guard");
    assert_eq!(lint_guard.target_policy, TargetPolicy::Summoner);
}

#[test]
fn encounter_names_parse_case_insensitively() {
    assert_eq!(
        EncounterKind::from_name(" Hamper_King "),
        Some(EncounterKind::HamperKing)
    );
    assert_eq!(EncounterKind::from_name("gauntlet"), Some(EncounterKind::Gauntlet));
    assert_eq!(EncounterKind::from_name("dragon"), None);
}

#[test]
fn every_encounter_builds_with_closed_doors() {
    let db = defs();
    for kind in EncounterKind::ALL {
        let room = Room::build(kind, &db, SimConfig::default(), RoomConfig::default(), false)
            .expect("room");
        assert!(!room.doors_open());
        assert_eq!(room.outcome(), RoomOutcome::InProgress);
        match kind {
            EncounterKind::Gauntlet => {
                assert!(room.boss_id().is_none());
                assert_eq!(room.hostile_count(), 13);
            }
            _ => {
                assert!(room.boss_id().is_some());
                assert_eq!(room.hostile_count(), 1);
            }
        }
    }
}

#[test]
fn missing_def_is_a_build_error() {
    let err = Room::build(
        EncounterKind::Gauntlet,
        &DefDatabase::default(),
        SimConfig::default(),
        RoomConfig::default(),
        false,
    )
    .expect_err("err");
    assert!(matches!(err, RoomBuildError::UnknownArchetype { .. }));
}

#[test]
fn invalid_room_config_is_rejected() {
    let config = RoomConfig {
        arena_width: 0.0,
        ..RoomConfig::default()
    };
    let err = Room::build(EncounterKind::Gauntlet, &defs(), SimConfig::default(), config, false)
        .expect_err("err");
    assert!(matches!(
        err,
        RoomBuildError::InvalidRoomConfig {
            field: "arena_width"
        }
    ));
}

#[test]
fn gauntlet_enemies_target_the_player() {
    let room = manual_room(EncounterKind::Gauntlet);
    for enemy in room.world().enemies() {
        assert_eq!(enemy.target().id(), Some(room.player_id()));
        assert!(!enemy.is_paused());
    }
}

#[test]
fn summons_are_placed_on_a_ring_and_resumed_after_delay() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    let boss_position = room.world().enemy(boss).expect("boss").position();

    let stats = room.apply_intents(vec![Intent::SpawnEnemies {
        summoner: boss,
        requests: vec![SpawnRequest::new("sock_normal", 2)],
    }]);
    assert_eq!(
        stats,
        IntentApplyStats {
            applied: 1,
            ..IntentApplyStats::default()
        }
    );

    let socks = children_of(&room, boss);
    assert_eq!(socks.len(), 2);
    for id in &socks {
        let sock = room.world().enemy(*id).expect("sock");
        assert!(sock.is_paused());
        assert_eq!(sock.target().id(), Some(room.player_id()));
        let distance = sock.position().distance(boss_position);
        assert!((distance - (32.0 + SUMMON_RING_GAP + 14.0)).abs() < 0.5);
    }

    for _ in 0..9 {
        room.step(ms(100));
    }
    assert!(socks
        .iter()
        .all(|id| room.world().enemy(*id).expect("sock").is_paused()));

    room.step(ms(100));
    assert!(socks
        .iter()
        .all(|id| !room.world().enemy(*id).expect("sock").is_paused()));
}

#[test]
fn bad_intents_are_counted_not_applied() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    let before = room.world().enemies().count();

    let stats = room.apply_intents(vec![
        Intent::SpawnEnemies {
            summoner: boss,
            requests: vec![SpawnRequest::new("ghost_sock", 1)],
        },
        Intent::SpawnEnemies {
            summoner: EntityId(999),
            requests: vec![SpawnRequest::new("sock_normal", 1)],
        },
        Intent::ShowDialog {
            boss_id: EntityId(999),
            lines: vec!["hello".to_string()],
            background: String::new(),
        },
        Intent::Dying {
            entity_id: EntityId(999),
            summoned: false,
        },
    ]);

    assert_eq!(
        stats,
        IntentApplyStats {
            applied: 0,
            invalid_target: 3,
            unknown_archetype: 1,
        }
    );
    assert_eq!(room.world().enemies().count(), before);
    assert!(!room.dialogs().is_showing());
}

#[test]
fn phase_change_updates_presentation_and_summons_orbiters() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    enter_second_phase(&mut room, boss);

    let presentation = room.presentation();
    assert_eq!(
        presentation.background.as_deref(),
        Some("backgrounds/laundry_enraged.png")
    );
    assert_eq!(
        presentation.transition_text.as_deref(),
        Some("The Hamper King is furious!")
    );
    assert_eq!(presentation.boss_phase, Some(2));

    let guards = children_of(&room, boss);
    assert_eq!(guards.len(), 2);
    for id in guards {
        let guard = room.world().enemy(id).expect("guard");
        assert_eq!(guard.def_name(), "lint_guard");
        assert_eq!(guard.target().id(), Some(boss));
    }

    // The transition banner clears on its own.
    room.step(TRANSITION_TEXT_TTL);
    assert_eq!(room.presentation().transition_text, None);
}

#[test]
fn boss_defeat_clears_room_and_rewards_only_the_boss() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    room.apply_intents(vec![Intent::SpawnEnemies {
        summoner: boss,
        requests: vec![SpawnRequest::new("sock_normal", 2)],
    }]);
    enter_second_phase(&mut room, boss);
    assert_eq!(room.hostile_count(), 5);

    let outcome = room.world_mut().take_damage(boss, 1_000.0);
    assert!(matches!(outcome, DamageOutcome::Killed { .. }));
    room.step(ms(16));

    // Minions die with the boss; the boss waits for its last words.
    assert_eq!(room.hostile_count(), 1);
    assert_eq!(room.reward(), 0);
    assert!(!room.doors_open());
    assert!(room.dialogs().is_showing());

    assert!(room.acknowledge_dialog());
    assert_eq!(room.hostile_count(), 0);
    assert_eq!(room.reward(), RoomConfig::default().reward_per_enemy);
    assert!(room.doors_open());
    assert_eq!(room.outcome(), RoomOutcome::Cleared);
}

#[test]
fn paused_room_freezes_projectiles_and_summon_timers() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    room.apply_intents(vec![
        Intent::SpawnEnemies {
            summoner: boss,
            requests: vec![SpawnRequest::new("sock_normal", 1)],
        },
        Intent::SpawnProjectile {
            owner: boss,
            origin: Vec2::new(100.0, 100.0),
            velocity: Vec2::new(50.0, 0.0),
            damage: 3,
        },
    ]);
    let sock = children_of(&room, boss)[0];

    room.pause_room();
    assert!(room.is_paused());
    for _ in 0..4 {
        room.step(ms(500));
    }
    assert_eq!(room.world().clock(), Duration::ZERO);
    assert_eq!(room.elapsed(), Duration::ZERO);
    assert_eq!(room.projectiles()[0].position, Vec2::new(100.0, 100.0));
    assert!(room.world().enemy(sock).expect("sock").is_paused());

    room.resume_room();
    // Still waiting out the summon delay; resuming the room must not wake it.
    assert!(room.world().enemy(sock).expect("sock").is_paused());
    room.step(ms(1_000));
    assert!((room.projectiles()[0].position.x - 150.0).abs() < 1e-3);
    assert!(!room.world().enemy(sock).expect("sock").is_paused());
}

#[test]
fn open_dialog_freezes_world_and_projectiles_until_acknowledged() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    let player = room.player_id();
    room.apply_intents(vec![Intent::SpawnProjectile {
        owner: boss,
        origin: Vec2::new(100.0, 100.0),
        velocity: Vec2::new(50.0, 0.0),
        damage: 3,
    }]);
    room.step(ms(16));
    assert!(matches!(
        room.world_mut().take_damage(boss, 300.0),
        DamageOutcome::Applied { .. }
    ));
    room.step(ms(16));
    assert!(room.dialogs().is_showing());
    assert!(room.world().is_paused());

    let snapshot = |room: &Room| {
        let enemies = room
            .world()
            .enemies()
            .map(|enemy| (enemy.id(), enemy.position(), enemy.health().current()))
            .collect::<Vec<_>>();
        let projectiles = room
            .projectiles()
            .iter()
            .map(|projectile| projectile.position)
            .collect::<Vec<_>>();
        let body = room.world().player(player).expect("player");
        (
            room.world().clock(),
            body.position(),
            body.health().current(),
            enemies,
            projectiles,
        )
    };
    let frozen = snapshot(&room);
    let elapsed = room.elapsed();

    for _ in 0..313 {
        room.step(ms(16));
    }
    assert!(room.dialogs().is_showing());
    assert_eq!(snapshot(&room), frozen);
    assert_eq!(room.elapsed(), elapsed + ms(313 * 16));
    assert_eq!(room.outcome(), RoomOutcome::InProgress);

    assert!(room.acknowledge_dialog());
    assert!(!room.world().is_paused());
    room.step(ms(16));
    assert_eq!(room.world().clock(), frozen.0 + ms(16));
    assert!(room.projectiles()[0].position.x > frozen.4[0].x);
}

#[test]
fn menu_resume_keeps_the_world_frozen_while_a_dialog_is_up() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    room.world_mut().take_damage(boss, 300.0);
    room.step(ms(16));
    assert!(room.dialogs().is_showing());

    room.pause_room();
    room.resume_room();
    assert!(room.world().is_paused());
    let clock = room.world().clock();
    room.step(ms(500));
    assert_eq!(room.world().clock(), clock);

    assert!(room.acknowledge_dialog());
    room.step(ms(500));
    assert_eq!(room.world().clock(), clock + ms(500));
}

#[test]
fn projectile_hits_the_player_once() {
    let mut room = manual_room(EncounterKind::HamperKing);
    let boss = room.boss_id().expect("boss");
    let player = room.player_id();
    let start = room.world().player(player).expect("player").position();
    room.apply_intents(vec![Intent::SpawnProjectile {
        owner: boss,
        origin: start - Vec2::new(30.0, 0.0),
        velocity: Vec2::new(100.0, 0.0),
        damage: 7,
    }]);

    room.step(ms(100));
    assert_eq!(room.projectiles().len(), 1);
    assert_eq!(room.world().player(player).expect("player").health().current(), 100);

    room.step(ms(100));
    assert!(room.projectiles().is_empty());
    assert_eq!(room.world().player(player).expect("player").health().current(), 93);
}

#[test]
fn player_death_ends_the_room() {
    let mut room = manual_room(EncounterKind::MoldMatron);
    let player = room.player_id();
    let outcome = room.world_mut().take_damage(player, 500.0);
    assert!(matches!(outcome, DamageOutcome::Killed { .. }));
    room.step(ms(16));
    assert_eq!(room.outcome(), RoomOutcome::PlayerDefeated);

    let clock = room.world().clock();
    room.step(ms(16));
    assert_eq!(room.world().clock(), clock);
}

#[test]
fn dialog_director_auto_acknowledges_in_order() {
    let mut director = DialogDirector::new(1_000, true);
    director.show(EntityId(1), vec!["a".to_string(), "b".to_string()], String::new());
    director.show(EntityId(2), vec!["c".to_string()], String::new());
    assert_eq!(director.shown_total(), 2);

    assert_eq!(director.tick(ms(1_500)), None);
    assert_eq!(director.tick(ms(500)), Some(EntityId(1)));
    assert_eq!(director.current().map(|dialog| dialog.boss_id), Some(EntityId(2)));
    assert_eq!(director.tick(ms(1_000)), Some(EntityId(2)));
    assert!(!director.is_showing());
}

#[test]
fn manual_director_waits_for_acknowledge() {
    let mut director = DialogDirector::new(1, false);
    director.show(EntityId(1), vec!["a".to_string()], String::new());
    assert_eq!(director.tick(ms(10_000)), None);
    assert_eq!(director.finish(), Some(EntityId(1)));
    assert_eq!(director.finish(), None);
}

#[test]
fn scripted_player_picks_nearest_enemy_in_range() {
    let room = manual_room(EncounterKind::Gauntlet);
    let player = room.world().player(room.player_id()).expect("player").position();
    let (nearest, gap) = room
        .world()
        .enemies()
        .map(|enemy| {
            (
                enemy.id(),
                enemy.position().distance(player) - enemy.body.radius,
            )
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("enemy");

    assert_eq!(
        ScriptedPlayer::pick_target(room.world(), player, gap + 0.5),
        Some(nearest)
    );
    assert_eq!(ScriptedPlayer::pick_target(room.world(), player, gap - 0.5), None);
}

#[test]
fn scripted_player_stays_inside_the_arena() {
    let bounds = RoomConfig::default().bounds();
    let mut pilot = ScriptedPlayer::default();
    for _ in 0..500 {
        let position = pilot.next_position(bounds, 140.0, ms(16));
        assert!(bounds.contains(position));
    }
}

#[test]
fn headless_runs_finish_consistently() {
    let db = defs();
    for kind in EncounterKind::ALL {
        let mut room = Room::build(kind, &db, SimConfig::default(), RoomConfig::default(), true)
            .expect("room");
        while room.outcome() == RoomOutcome::InProgress && room.elapsed() < Duration::from_secs(45) {
            room.step(ms(16));
        }
        // The world sits still while dialogs are up.
        assert!(room.world().clock() <= room.elapsed());
        let summary = room.summary();
        assert_eq!(summary.intents.unknown_archetype, 0);
        match summary.outcome {
            RoomOutcome::Cleared => {
                assert_eq!(summary.hostiles_left, 0);
                assert!(summary.reward > 0);
            }
            RoomOutcome::PlayerDefeated => assert_eq!(summary.player_health, 0),
            RoomOutcome::InProgress => assert!(summary.elapsed >= Duration::from_secs(45)),
        }
    }
}

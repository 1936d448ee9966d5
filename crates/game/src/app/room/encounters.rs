#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncounterKind {
    HamperKing,
    NightProctor,
    MoldMatron,
    Gauntlet,
}

impl EncounterKind {
    pub(crate) const ALL: [EncounterKind; 4] = [
        EncounterKind::HamperKing,
        EncounterKind::NightProctor,
        EncounterKind::MoldMatron,
        EncounterKind::Gauntlet,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            EncounterKind::HamperKing => "hamper_king",
            EncounterKind::NightProctor => "night_proctor",
            EncounterKind::MoldMatron => "mold_matron",
            EncounterKind::Gauntlet => "gauntlet",
        }
    }

    pub(crate) fn from_name(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(raw))
    }

    pub(crate) fn plan(self) -> EncounterPlan {
        match self {
            EncounterKind::HamperKing => hamper_king(),
            EncounterKind::NightProctor => night_proctor(),
            EncounterKind::MoldMatron => mold_matron(),
            EncounterKind::Gauntlet => gauntlet(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BossPlan {
    /// Enemy def supplying the boss body.
    pub(crate) body: &'static str,
    pub(crate) spec: BossSpec,
}

#[derive(Debug, Clone)]
pub(crate) struct EncounterPlan {
    pub(crate) background: &'static str,
    pub(crate) boss: Option<BossPlan>,
    pub(crate) wave: Vec<(&'static str, u32)>,
}

impl EncounterPlan {
    /// Every enemy def the encounter can put in the room, summons included.
    pub(crate) fn required_defs(&self) -> BTreeSet<String> {
        let mut names = self
            .wave
            .iter()
            .map(|(name, _)| name.to_string())
            .collect::<BTreeSet<_>>();
        if let Some(boss) = &self.boss {
            names.insert(boss.body.to_string());
            for phase in &boss.spec.phases {
                for request in &phase.entry.summon {
                    names.insert(request.archetype.clone());
                }
                for skill in &phase.skills {
                    if let SkillKind::Summon { spawns, .. } = &skill.kind {
                        names.extend(spawns.iter().map(|request| request.archetype.clone()));
                    }
                }
            }
        }
        names
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn summon(archetype: &str, count: u32, max_alive: usize) -> SkillKind {
    SkillKind::Summon {
        spawns: vec![SpawnRequest::new(archetype, count)],
        max_alive,
    }
}

fn volley(projectiles: u32, spread_degrees: f32, projectile_speed: f32, damage: u32) -> SkillKind {
    SkillKind::Volley {
        charge: ms(600),
        projectiles,
        spread_degrees,
        projectile_speed,
        damage,
    }
}

fn hamper_king() -> EncounterPlan {
    let phase_one = PhaseSpec {
        skills: vec![
            SkillSpec::new("summon_socks", secs(8), summon("sock_normal", 2, 4)),
            SkillSpec::new("lid_volley", secs(4), volley(3, 30.0, 180.0, 5)),
        ],
        entry: PhaseEntry::default(),
        exit: Some(PhaseExit {
            threshold_fraction: 0.6,
            dialog: DialogSpec::new(
                &[
                    "Enough folding!",
                    "Every sock in this house answers to me.",
                ],
                "dialog/hamper_king.png",
            ),
        }),
    };
    let phase_two = PhaseSpec {
        skills: vec![
            SkillSpec::new("summon_angry_socks", secs(8), summon("sock_angry", 2, 5)),
            SkillSpec::new("lid_volley", secs(4), volley(5, 60.0, 200.0, 5)),
            SkillSpec::new(
                "tumble_dash",
                secs(6),
                SkillKind::ChargeDash {
                    charge: ms(800),
                    dash_speed: 7.0,
                    burst: ms(400),
                },
            ),
        ],
        entry: PhaseEntry {
            background: Some("backgrounds/laundry_enraged.png".to_string()),
            transition_text: Some("The Hamper King is furious!".to_string()),
            speed_multiplier: 1.3,
            summon: vec![SpawnRequest::new("lint_guard", 2)],
            ..PhaseEntry::default()
        },
        exit: None,
    };
    EncounterPlan {
        background: "backgrounds/laundry_room.png",
        boss: Some(BossPlan {
            body: "hamper_king",
            spec: BossSpec {
                name: "The Hamper King".to_string(),
                phases: vec![phase_one, phase_two],
                defeat_dialog: DialogSpec::new(
                    &["My kingdom... of lint..."],
                    "dialog/hamper_king_defeated.png",
                ),
            },
        }),
        wave: Vec::new(),
    }
}

fn night_proctor() -> EncounterPlan {
    let drowsy_lecture = || {
        SkillSpec::new(
            "drowsy_lecture",
            secs(8),
            SkillKind::Nova {
                radius: 140.0,
                damage: 6,
                effect: Some(StatusEffectKind::Sleep),
            },
        )
    };
    let phase_one = PhaseSpec {
        skills: vec![
            drowsy_lecture(),
            SkillSpec::new("chalk_volley", secs(4), volley(5, 40.0, 220.0, 5)),
        ],
        entry: PhaseEntry::default(),
        exit: Some(PhaseExit {
            threshold_fraction: 0.66,
            dialog: DialogSpec::new(
                &["Eyes on your own paper."],
                "dialog/night_proctor.png",
            ),
        }),
    };
    let phase_two = PhaseSpec {
        skills: vec![
            SkillSpec::new(
                "pop_quiz",
                secs(60),
                SkillKind::Intermission {
                    fly_out: ms(1_200),
                    dialog: DialogSpec::new(
                        &["Pop quiz!", "Name every sock you have lost this year."],
                        "dialog/night_proctor_quiz.png",
                    ),
                    fly_in: ms(1_200),
                    resume_delay: ms(800),
                },
            ),
            SkillSpec::new("chalk_volley", secs(4), volley(5, 40.0, 220.0, 5)),
            SkillSpec::new("summon_assistants", secs(15), summon("teaching_assistant", 1, 2)),
        ],
        entry: PhaseEntry {
            fade: Some(BackgroundFade {
                path: "backgrounds/lecture_hall_dark.png".to_string(),
                duration: ms(1_500),
            }),
            ..PhaseEntry::default()
        },
        exit: Some(PhaseExit {
            threshold_fraction: 0.33,
            dialog: DialogSpec::new(
                &["You leave me no choice.", "Final exam. Now."],
                "dialog/night_proctor.png",
            ),
        }),
    };
    let phase_three = PhaseSpec {
        skills: vec![
            SkillSpec::new("chalk_volley", secs(3), volley(9, 90.0, 240.0, 4)),
            drowsy_lecture(),
            SkillSpec::new(
                "blink",
                secs(5),
                SkillKind::Blink {
                    margin: 60.0,
                    min_distance_from_target: 150.0,
                },
            ),
        ],
        entry: PhaseEntry {
            transition_text: Some("Pencils down!".to_string()),
            resume_delay: Some(ms(1_500)),
            ..PhaseEntry::default()
        },
        exit: None,
    };
    EncounterPlan {
        background: "backgrounds/lecture_hall.png",
        boss: Some(BossPlan {
            body: "night_proctor",
            spec: BossSpec {
                name: "The Night Proctor".to_string(),
                phases: vec![phase_one, phase_two, phase_three],
                defeat_dialog: DialogSpec::new(
                    &["Class... dismissed."],
                    "dialog/night_proctor_defeated.png",
                ),
            },
        }),
        wave: Vec::new(),
    }
}

fn mold_matron() -> EncounterPlan {
    let spore_cloud = || {
        SkillSpec::new(
            "spore_cloud",
            secs(4),
            SkillKind::Nova {
                radius: 120.0,
                damage: 4,
                effect: Some(StatusEffectKind::Poison),
            },
        )
    };
    let phase_one = PhaseSpec {
        skills: vec![
            spore_cloud(),
            SkillSpec::new("summon_mites", secs(8), summon("spore_mite", 3, 6)),
        ],
        entry: PhaseEntry::default(),
        exit: Some(PhaseExit {
            threshold_fraction: 0.5,
            dialog: DialogSpec::new(
                &["You cannot scrub me away.", "I am in the walls now."],
                "dialog/mold_matron.png",
            ),
        }),
    };
    let phase_two = PhaseSpec {
        skills: vec![
            SkillSpec::new(
                "terror_bloom",
                secs(8),
                SkillKind::Nova {
                    radius: 180.0,
                    damage: 8,
                    effect: Some(StatusEffectKind::Fear),
                },
            ),
            SkillSpec::new("rally", secs(15), SkillKind::Rally),
            spore_cloud(),
            SkillSpec::new("summon_creepers", secs(15), summon("wall_creeper", 2, 3)),
        ],
        entry: PhaseEntry {
            background: Some("backgrounds/greenhouse_overgrown.png".to_string()),
            movement: Some(MovementStrategy::KeepDistance {
                preferred_distance: 200.0,
                tolerance: 30.0,
            }),
            ..PhaseEntry::default()
        },
        exit: None,
    };
    EncounterPlan {
        background: "backgrounds/greenhouse.png",
        boss: Some(BossPlan {
            body: "mold_matron",
            spec: BossSpec {
                name: "The Mold Matron".to_string(),
                phases: vec![phase_one, phase_two],
                defeat_dialog: DialogSpec::new(
                    &["The spores... will return..."],
                    "dialog/mold_matron_defeated.png",
                ),
            },
        }),
        wave: Vec::new(),
    }
}

fn gauntlet() -> EncounterPlan {
    EncounterPlan {
        background: "backgrounds/hallway.png",
        boss: None,
        wave: vec![
            ("sock_normal", 3),
            ("sock_angry", 2),
            ("dust_bunny", 2),
            ("teaching_assistant", 1),
            ("paper_plane", 1),
            ("wall_creeper", 1),
            ("spore_mite", 2),
            ("sleepy_pillow", 1),
        ],
    }
}

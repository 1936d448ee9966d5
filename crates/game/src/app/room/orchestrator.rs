/// One combat room: the combat world plus everything the core delegates
/// outward (summon placement, dialogs, presentation, projectiles, rewards
/// and doors).
#[derive(Debug)]
pub(crate) struct Room {
    encounter: EncounterKind,
    config: RoomConfig,
    world: CombatWorld,
    archetypes: BTreeMap<String, EnemyArchetype>,
    player_id: EntityId,
    boss_id: Option<EntityId>,
    hostiles: BTreeSet<EntityId>,
    summon_resumes: Vec<(EntityId, Duration)>,
    projectiles: Vec<Projectile>,
    dialogs: DialogDirector,
    presentation: RoomPresentation,
    autopilot: Option<ScriptedPlayer>,
    reward: u32,
    doors_open: bool,
    paused: bool,
    outcome: RoomOutcome,
    elapsed: Duration,
    intent_stats: IntentApplyStats,
}

impl Room {
    /// `autopilot` drives the player with [`ScriptedPlayer`] and lets the
    /// dialog director acknowledge on its own.
    pub(crate) fn build(
        encounter: EncounterKind,
        defs: &DefDatabase,
        sim: SimConfig,
        config: RoomConfig,
        autopilot: bool,
    ) -> Result<Self, RoomBuildError> {
        config.validate()?;
        let plan = encounter.plan();
        let archetypes = defs
            .enemy_defs()
            .iter()
            .map(|def| (def.def_name().to_string(), def.archetype.clone()))
            .collect::<BTreeMap<_, _>>();
        if let Some(def_name) = plan
            .required_defs()
            .into_iter()
            .find(|name| !archetypes.contains_key(name))
        {
            return Err(RoomBuildError::UnknownArchetype {
                encounter: encounter.name(),
                def_name,
            });
        }

        let mut world = CombatWorld::try_new(sim, config.bounds())?;
        let center = config.bounds().center();
        let player_id = world.spawn_player(
            center + Vec2::new(0.0, PLAYER_SPAWN_OFFSET_Y),
            config.player_max_health,
            config.player_radius,
        );

        let mut hostiles = BTreeSet::new();
        let mut boss_id = None;
        if let Some(boss) = plan.boss {
            let body = archetype_for(&archetypes, boss.body, encounter)?;
            let id = world.spawn_boss(body, boss.spec, center - Vec2::new(0.0, 120.0))?;
            world.set_target(id, Some(player_id));
            hostiles.insert(id);
            boss_id = Some(id);
        }

        let total = plan.wave.iter().map(|(_, count)| *count).sum::<u32>().max(1);
        let ring_radius = config.arena_width.min(config.arena_height) * 0.3;
        let mut slot = 0u32;
        for (def_name, count) in &plan.wave {
            let archetype = archetype_for(&archetypes, def_name, encounter)?;
            for _ in 0..*count {
                let angle = TAU * slot as f32 / total as f32 - TAU * 0.25;
                slot += 1;
                let id = world.spawn_enemy(
                    archetype,
                    center + Vec2::from_angle(angle) * ring_radius,
                    None,
                );
                // No summoner here, so every policy falls back to the player.
                world.set_target(id, Some(player_id));
                hostiles.insert(id);
            }
        }

        info!(
            encounter = encounter.name(),
            hostiles = hostiles.len(),
            boss_id = boss_id.map_or(-1, |id: EntityId| id.0 as i64),
            "encounter_started"
        );

        Ok(Self {
            encounter,
            dialogs: DialogDirector::new(config.dialog_ms_per_line, autopilot),
            config,
            world,
            archetypes,
            player_id,
            boss_id,
            hostiles,
            summon_resumes: Vec::new(),
            projectiles: Vec::new(),
            presentation: RoomPresentation {
                background: Some(plan.background.to_string()),
                ..RoomPresentation::default()
            },
            autopilot: autopilot.then(ScriptedPlayer::default),
            reward: 0,
            doors_open: false,
            paused: false,
            outcome: RoomOutcome::InProgress,
            elapsed: Duration::ZERO,
            intent_stats: IntentApplyStats::default(),
        })
    }

    /// One fixed step. Intents raised by the advance are applied before it
    /// returns; the stats describe just this step.
    pub(crate) fn step(&mut self, dt: Duration) -> IntentApplyStats {
        if self.paused || self.outcome != RoomOutcome::InProgress {
            return IntentApplyStats::default();
        }
        self.elapsed += dt;
        self.drive_player(dt);
        self.world.advance(dt);
        if let Some(boss_id) = self.dialogs.tick(dt) {
            self.close_dialog(boss_id);
        }
        if !self.dialogs.is_showing() {
            self.step_projectiles(dt);
        }
        let stats = self.flush_intents();
        self.resume_due_summons();
        self.tick_presentation(dt);
        stats
    }

    /// Menu pause: freezes the world and every room timer.
    pub(crate) fn pause_room(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.sync_world_pause();
    }

    pub(crate) fn resume_room(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.sync_world_pause();
    }

    /// The world runs only while the room is unpaused and no dialog is up.
    fn sync_world_pause(&mut self) {
        let hold = self.paused || self.dialogs.is_showing();
        if hold && !self.world.is_paused() {
            self.world.pause_timers();
        } else if !hold && self.world.is_paused() {
            self.world.resume_timers();
        }
    }

    /// Resumes the world before telling the boss, so timers the boss starts
    /// on acknowledgement run their full length.
    fn close_dialog(&mut self, boss_id: EntityId) {
        self.sync_world_pause();
        self.world.on_dialog_finished(boss_id);
    }

    /// Closes the dialog on screen, as a player click would. False when no
    /// dialog is showing.
    pub(crate) fn acknowledge_dialog(&mut self) -> bool {
        let Some(boss_id) = self.dialogs.finish() else {
            return false;
        };
        self.close_dialog(boss_id);
        self.flush_intents();
        true
    }

    fn flush_intents(&mut self) -> IntentApplyStats {
        let intents = self.world.drain_intents();
        let stats = self.apply_intents(intents);
        self.intent_stats.merge(stats);
        if self.doors_open && self.outcome == RoomOutcome::InProgress {
            self.outcome = RoomOutcome::Cleared;
        }
        self.sync_world_pause();
        stats
    }

    pub(crate) fn apply_intents(&mut self, intents: Vec<Intent>) -> IntentApplyStats {
        let mut stats = IntentApplyStats::default();
        for intent in intents {
            trace!(
                kind = ?intent.kind(),
                payload = %intent.to_json().unwrap_or_default(),
                "intent_received"
            );
            match intent {
                Intent::Dying {
                    entity_id,
                    summoned,
                } => self.on_dying(entity_id, summoned, &mut stats),
                Intent::PhaseChanged { boss_id, phase } => {
                    info!(boss_id = boss_id.0, phase, "room_boss_phase_changed");
                    self.presentation.boss_phase = Some(phase);
                    stats.applied += 1;
                }
                Intent::ShowDialog {
                    boss_id,
                    lines,
                    background,
                } => {
                    if self.world.enemy(boss_id).is_some() {
                        debug!(boss_id = boss_id.0, lines = lines.len(), "dialog_shown");
                        self.dialogs.show(boss_id, lines, background);
                        stats.applied += 1;
                    } else {
                        warn!(boss_id = boss_id.0, "dialog_for_missing_boss");
                        stats.invalid_target += 1;
                    }
                }
                Intent::SpawnEnemies {
                    summoner,
                    requests,
                } => self.spawn_summons(summoner, &requests, &mut stats),
                Intent::ChangeBackground { path } => {
                    self.presentation.background = Some(path);
                    self.presentation.fade = None;
                    stats.applied += 1;
                }
                Intent::FadeBackground { path, duration_ms } => {
                    self.presentation.background = Some(path.clone());
                    self.presentation.fade = Some(BackgroundFade {
                        path,
                        duration: Duration::from_millis(duration_ms),
                    });
                    stats.applied += 1;
                }
                Intent::ShowTransitionText { text } => {
                    self.presentation.transition_text = Some(text);
                    self.presentation.transition_text_left = TRANSITION_TEXT_TTL;
                    stats.applied += 1;
                }
                Intent::SpawnProjectile {
                    owner,
                    origin,
                    velocity,
                    damage,
                } => {
                    if origin.is_finite() && velocity.is_finite() {
                        self.projectiles.push(Projectile {
                            owner,
                            position: origin,
                            velocity,
                            damage,
                            age: Duration::ZERO,
                        });
                        stats.applied += 1;
                    } else {
                        stats.invalid_target += 1;
                    }
                }
            }
        }
        stats
    }

    fn spawn_summons(
        &mut self,
        summoner: EntityId,
        requests: &[SpawnRequest],
        stats: &mut IntentApplyStats,
    ) {
        let Some((origin, summoner_radius)) = self
            .world
            .enemy(summoner)
            .filter(|enemy| enemy.is_alive())
            .map(|enemy| (enemy.position(), enemy.body.radius))
        else {
            warn!(summoner = summoner.0, "spawn_request_for_missing_summoner");
            stats.invalid_target += 1;
            return;
        };

        let mut placements = Vec::new();
        for request in requests {
            match self.archetypes.get(&request.archetype) {
                Some(archetype) => {
                    placements.extend((0..request.count).map(|_| archetype.clone()));
                }
                None => {
                    warn!(
                        summoner = summoner.0,
                        archetype = %request.archetype,
                        "spawn_request_unknown_archetype"
                    );
                    stats.unknown_archetype += 1;
                }
            }
        }
        if placements.is_empty() {
            return;
        }

        let resume_at = self.world.clock() + Duration::from_millis(self.config.summon_resume_delay_ms);
        let total = placements.len();
        for (index, archetype) in placements.iter().enumerate() {
            let angle = TAU * index as f32 / total as f32;
            let distance = summoner_radius + SUMMON_RING_GAP + archetype.radius;
            let position = origin + Vec2::from_angle(angle) * distance;
            let id = self.world.spawn_enemy(archetype, position, Some(summoner));
            let target = match archetype.target_policy {
                TargetPolicy::Player => self.player_id,
                TargetPolicy::Summoner => summoner,
            };
            self.world.set_target(id, Some(target));
            self.hostiles.insert(id);
            self.summon_resumes.push((id, resume_at));
        }
        debug!(summoner = summoner.0, spawned = total, "summons_placed");
        stats.applied += 1;
    }

    fn on_dying(&mut self, entity_id: EntityId, summoned: bool, stats: &mut IntentApplyStats) {
        if entity_id == self.player_id {
            info!(player_id = entity_id.0, "player_defeated");
            self.outcome = RoomOutcome::PlayerDefeated;
            stats.applied += 1;
            return;
        }
        if !self.hostiles.remove(&entity_id) {
            warn!(entity_id = entity_id.0, "dying_intent_for_unknown_entity");
            stats.invalid_target += 1;
            return;
        }
        self.summon_resumes.retain(|(id, _)| *id != entity_id);
        if !summoned {
            self.reward = self.reward.saturating_add(self.config.reward_per_enemy);
        }
        debug!(
            entity_id = entity_id.0,
            summoned,
            hostiles_left = self.hostiles.len(),
            "hostile_removed"
        );
        stats.applied += 1;

        if self.hostiles.is_empty() && !self.doors_open {
            self.doors_open = true;
            info!(
                encounter = self.encounter.name(),
                reward = self.reward,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "room_cleared"
            );
        }
    }

    fn resume_due_summons(&mut self) {
        let now = self.world.clock();
        let mut due = Vec::new();
        self.summon_resumes.retain(|(id, resume_at)| {
            if *resume_at <= now {
                due.push(*id);
                false
            } else {
                true
            }
        });
        for id in due {
            if self.world.resume_entity(id) {
                debug!(enemy_id = id.0, "summon_resumed");
            }
        }
    }

    fn drive_player(&mut self, dt: Duration) {
        let Some(autopilot) = self.autopilot.as_mut() else {
            return;
        };
        if self.dialogs.is_showing() {
            return;
        }
        let Some(player) = self.world.player(self.player_id) else {
            return;
        };
        if !player.is_alive() {
            return;
        }
        autopilot.cool_down(dt);
        if player.statuses.blocks_action() {
            return;
        }
        let speed = self.config.player_speed
            * player
                .statuses
                .speed_multiplier(&self.world.config().effects);

        let position = autopilot.next_position(self.world.bounds(), speed, dt);
        self.world.set_player_position(self.player_id, position);
        if !autopilot.can_strike() {
            return;
        }
        if let Some(target) =
            ScriptedPlayer::pick_target(&self.world, position, self.config.player_strike_range)
        {
            let outcome = self
                .world
                .take_damage(target, self.config.player_strike_damage);
            autopilot.start_strike_cooldown(Duration::from_millis(
                self.config.player_strike_cooldown_ms,
            ));
            debug!(target = target.0, outcome = ?outcome, "player_strike");
        }
    }

    fn step_projectiles(&mut self, dt: Duration) {
        if self.projectiles.is_empty() {
            return;
        }
        let player = self
            .world
            .player(self.player_id)
            .filter(|player| player.is_alive())
            .map(|player| (player.position(), player.body.radius));
        let bounds = self.world.bounds();
        let lifetime = Duration::from_millis(self.config.projectile_lifetime_ms);
        let seconds = dt.as_secs_f32();
        let mut hits = Vec::new();
        self.projectiles.retain_mut(|projectile| {
            projectile.position += projectile.velocity * seconds;
            projectile.age += dt;
            if let Some((position, radius)) = player {
                if projectile.position.distance(position) <= radius + PROJECTILE_RADIUS {
                    hits.push((projectile.owner, projectile.damage));
                    return false;
                }
            }
            bounds.contains(projectile.position) && projectile.age < lifetime
        });
        for (owner, damage) in hits {
            let outcome = self.world.take_damage(self.player_id, damage as f32);
            debug!(owner = owner.0, damage, outcome = ?outcome, "projectile_hit");
        }
    }

    fn tick_presentation(&mut self, dt: Duration) {
        if self.presentation.transition_text.is_none() {
            return;
        }
        self.presentation.transition_text_left =
            self.presentation.transition_text_left.saturating_sub(dt);
        if self.presentation.transition_text_left.is_zero() {
            self.presentation.transition_text = None;
        }
    }

    pub(crate) fn encounter(&self) -> EncounterKind {
        self.encounter
    }

    pub(crate) fn world(&self) -> &CombatWorld {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut CombatWorld {
        &mut self.world
    }

    pub(crate) fn player_id(&self) -> EntityId {
        self.player_id
    }

    pub(crate) fn boss_id(&self) -> Option<EntityId> {
        self.boss_id
    }

    pub(crate) fn hostile_count(&self) -> usize {
        self.hostiles.len()
    }

    pub(crate) fn reward(&self) -> u32 {
        self.reward
    }

    pub(crate) fn doors_open(&self) -> bool {
        self.doors_open
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn outcome(&self) -> RoomOutcome {
        self.outcome
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn presentation(&self) -> &RoomPresentation {
        &self.presentation
    }

    pub(crate) fn dialogs(&self) -> &DialogDirector {
        &self.dialogs
    }

    pub(crate) fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub(crate) fn intent_stats(&self) -> IntentApplyStats {
        self.intent_stats
    }

    pub(crate) fn summary(&self) -> RoomSummary {
        RoomSummary {
            encounter: self.encounter.name(),
            outcome: self.outcome,
            elapsed: self.elapsed,
            reward: self.reward,
            player_health: self
                .world
                .player(self.player_id)
                .map_or(0, |player| player.health().current()),
            hostiles_left: self.hostiles.len(),
            dialogs_shown: self.dialogs.shown_total(),
            intents: self.intent_stats,
        }
    }
}

fn archetype_for<'a>(
    archetypes: &'a BTreeMap<String, EnemyArchetype>,
    def_name: &str,
    encounter: EncounterKind,
) -> Result<&'a EnemyArchetype, RoomBuildError> {
    archetypes
        .get(def_name)
        .ok_or_else(|| RoomBuildError::UnknownArchetype {
            encounter: encounter.name(),
            def_name: def_name.to_string(),
        })
}

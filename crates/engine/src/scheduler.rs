use std::time::Duration;

/// Shortest period a periodic task may run at. Guards against a zero period
/// spinning forever inside one advance.
pub const MIN_TASK_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskMode {
    Periodic(Duration),
    Once { resumable: bool },
}

#[derive(Debug, Clone)]
struct ScheduledTask<K> {
    key: K,
    mode: TaskMode,
    next_fire: Duration,
    order: u64,
}

/// Per-entity set of named tasks driven by an external `advance`.
///
/// The scheduler keeps its own clock, which only moves while it is not
/// paused. Due tasks are handed out one at a time through [`next_due`], so a
/// handler that stops or cancels tasks is honoured for the rest of the same
/// advance.
///
/// [`next_due`]: TaskScheduler::next_due
#[derive(Debug, Clone)]
pub struct TaskScheduler<K> {
    tasks: Vec<ScheduledTask<K>>,
    now: Duration,
    horizon: Option<Duration>,
    paused: bool,
    next_order: u64,
}

impl<K> Default for TaskScheduler<K> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            now: Duration::ZERO,
            horizon: None,
            paused: false,
            next_order: 0,
        }
    }
}

impl<K: Copy + PartialEq> TaskScheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Starts (or restarts) `key` as a periodic task. First fire is one full
    /// period from now.
    pub fn start_periodic(&mut self, key: K, period: Duration) {
        let period = period.max(MIN_TASK_PERIOD);
        self.insert(key, TaskMode::Periodic(period), self.now + period);
    }

    pub fn start_once(&mut self, key: K, delay: Duration) {
        self.insert(key, TaskMode::Once { resumable: false }, self.now + delay);
    }

    /// One-shot continuation that resumes with the approximate remainder
    /// after a pause instead of its exact remaining time.
    pub fn start_once_resumable(&mut self, key: K, delay: Duration) {
        self.insert(key, TaskMode::Once { resumable: true }, self.now + delay);
    }

    fn insert(&mut self, key: K, mode: TaskMode, next_fire: Duration) {
        self.tasks.retain(|task| task.key != key);
        let order = self.next_order;
        self.next_order = self.next_order.saturating_add(1);
        self.tasks.push(ScheduledTask {
            key,
            mode,
            next_fire,
            order,
        });
    }

    pub fn stop(&mut self, key: K) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.key != key);
        before != self.tasks.len()
    }

    pub fn stop_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !predicate(&task.key));
        before - self.tasks.len()
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.tasks.iter().any(|task| task.key == key)
    }

    pub fn scheduled_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn remaining(&self, key: K) -> Option<Duration> {
        self.tasks
            .iter()
            .find(|task| task.key == key)
            .map(|task| task.next_fire.saturating_sub(self.now))
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Periodic tasks restart with a full period so a tick skipped while
    /// paused is never fired twice. Resumable one-shots continue after at most
    /// `one_shot_remainder`.
    pub fn resume(&mut self, one_shot_remainder: Duration) {
        if !self.paused {
            return;
        }
        self.paused = false;
        let now = self.now;
        for task in &mut self.tasks {
            match task.mode {
                TaskMode::Periodic(period) => task.next_fire = now + period,
                TaskMode::Once { resumable: true } => {
                    let remaining = task.next_fire.saturating_sub(now);
                    task.next_fire = now + remaining.min(one_shot_remainder);
                }
                TaskMode::Once { resumable: false } => {}
            }
        }
    }

    pub fn begin_advance(&mut self, dt: Duration) {
        self.horizon = if self.paused {
            None
        } else {
            Some(self.now + dt)
        };
    }

    /// Pops the earliest task due before the advance horizon and moves the
    /// clock to its fire time. Ties go to the task started first.
    pub fn next_due(&mut self) -> Option<K> {
        let horizon = self.horizon?;
        if self.paused {
            return None;
        }
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.next_fire <= horizon)
            .min_by_key(|(_, task)| (task.next_fire, task.order))
            .map(|(index, _)| index)?;

        let fire_at = self.tasks[index].next_fire;
        self.now = self.now.max(fire_at);
        let key = self.tasks[index].key;
        match self.tasks[index].mode {
            TaskMode::Periodic(period) => self.tasks[index].next_fire = fire_at + period,
            TaskMode::Once { .. } => {
                self.tasks.remove(index);
            }
        }
        Some(key)
    }

    pub fn finish_advance(&mut self) {
        if let Some(horizon) = self.horizon.take() {
            if !self.paused {
                self.now = self.now.max(horizon);
            }
        }
    }

    /// Advances and returns every fired key in order. Handlers that need to
    /// mutate the scheduler between fires should drive `next_due` directly.
    pub fn advance(&mut self, dt: Duration) -> Vec<K> {
        self.begin_advance(dt);
        let mut fired = Vec::new();
        while let Some(key) = self.next_due() {
            fired.push(key);
        }
        self.finish_advance();
        fired
    }
}

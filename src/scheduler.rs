use super::*;

pub(crate) const DEFAULT_TIMER_STEP_LIMIT: usize = 10_000;

/// Work a timer can run when it comes due. The set is closed: every timed
/// behavior on the page is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerCallback {
    AdvanceCarousel(CarouselKind),
    DeferredScrollReaction,
    ReleaseScrollThrottle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) interval_ms: Option<i64>,
    pub(crate) callback: TimerCallback,
}

/// Public snapshot of a queued timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
    pub interval_ms: Option<i64>,
}

/// How scroll events are folded into scroll reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimit {
    /// Every scroll reacts immediately.
    #[default]
    None,
    /// Only the trailing scroll reacts, after `wait` ms of quiet.
    Debounce(i64),
    /// The first scroll reacts immediately; further scrolls within the
    /// window are dropped.
    Throttle(i64),
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    pub(crate) task_queue: Vec<ScheduledTask>,
    pub(crate) now_ms: i64,
    pub(crate) timer_step_limit: usize,
    next_timer_id: i64,
    next_task_order: i64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            task_queue: Vec::new(),
            now_ms: 0,
            timer_step_limit: DEFAULT_TIMER_STEP_LIMIT,
            next_timer_id: 1,
            next_task_order: 0,
        }
    }
}

impl Scheduler {
    fn allocate_timer_id(&mut self) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        id
    }

    fn allocate_task_order(&mut self) -> i64 {
        let order = self.next_task_order;
        self.next_task_order += 1;
        order
    }

    pub(crate) fn set_timeout(&mut self, callback: TimerCallback, delay_ms: i64) -> i64 {
        let id = self.allocate_timer_id();
        let order = self.allocate_task_order();
        self.task_queue.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(delay_ms.max(0)),
            order,
            interval_ms: None,
            callback,
        });
        id
    }

    pub(crate) fn set_interval(&mut self, callback: TimerCallback, interval_ms: i64) -> i64 {
        let interval_ms = interval_ms.max(1);
        let id = self.allocate_timer_id();
        let order = self.allocate_task_order();
        self.task_queue.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(interval_ms),
            order,
            interval_ms: Some(interval_ms),
            callback,
        });
        id
    }

    pub(crate) fn reschedule_interval(&mut self, task: &ScheduledTask) {
        let Some(interval_ms) = task.interval_ms else {
            return;
        };
        let order = self.allocate_task_order();
        self.task_queue.push(ScheduledTask {
            id: task.id,
            due_at: task.due_at.saturating_add(interval_ms),
            order,
            interval_ms: task.interval_ms,
            callback: task.callback,
        });
    }

    pub(crate) fn clear(&mut self, timer_id: i64) -> bool {
        let before = self.task_queue.len();
        self.task_queue.retain(|task| task.id != timer_id);
        self.task_queue.len() != before
    }

    pub(crate) fn clear_all(&mut self) -> usize {
        let cleared = self.task_queue.len();
        self.task_queue.clear();
        cleared
    }

    /// Index of the next task to run: earliest due time, then registration
    /// order. `due_limit` restricts to tasks already due.
    pub(crate) fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }

    pub(crate) fn take_next(&mut self, due_limit: Option<i64>) -> Option<ScheduledTask> {
        let idx = self.next_task_index(due_limit)?;
        Some(self.task_queue.remove(idx))
    }

    pub(crate) fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut pending: Vec<PendingTimer> = self
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
                interval_ms: task.interval_ms,
            })
            .collect();
        pending.sort_by_key(|timer| (timer.due_at, timer.order));
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_due_time_runs_in_registration_order() {
        let mut scheduler = Scheduler::default();
        let first = scheduler.set_timeout(TimerCallback::DeferredScrollReaction, 100);
        let second = scheduler.set_timeout(TimerCallback::ReleaseScrollThrottle, 100);

        scheduler.now_ms = 100;
        let task = scheduler.take_next(Some(scheduler.now_ms)).unwrap();
        assert_eq!(task.id, first);
        let task = scheduler.take_next(Some(scheduler.now_ms)).unwrap();
        assert_eq!(task.id, second);
        assert!(scheduler.take_next(Some(scheduler.now_ms)).is_none());
    }

    #[test]
    fn due_limit_skips_future_tasks() {
        let mut scheduler = Scheduler::default();
        scheduler.set_timeout(TimerCallback::DeferredScrollReaction, 500);
        assert!(scheduler.next_task_index(Some(499)).is_none());
        assert!(scheduler.next_task_index(Some(500)).is_some());
        assert!(scheduler.next_task_index(None).is_some());
    }

    #[test]
    fn interval_reschedules_relative_to_due_time() {
        let mut scheduler = Scheduler::default();
        let id = scheduler.set_interval(
            TimerCallback::AdvanceCarousel(CarouselKind::Projects),
            5000,
        );

        scheduler.now_ms = 5000;
        let task = scheduler.take_next(Some(scheduler.now_ms)).unwrap();
        assert_eq!(task.due_at, 5000);
        scheduler.reschedule_interval(&task);

        let pending = scheduler.pending_timers();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].due_at, 10_000);
        assert_eq!(pending[0].interval_ms, Some(5000));
    }

    #[test]
    fn clear_removes_only_the_given_timer() {
        let mut scheduler = Scheduler::default();
        let keep = scheduler.set_timeout(TimerCallback::DeferredScrollReaction, 10);
        let drop = scheduler.set_timeout(TimerCallback::ReleaseScrollThrottle, 20);

        assert!(scheduler.clear(drop));
        assert!(!scheduler.clear(drop));
        let pending = scheduler.pending_timers();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, keep);
    }

    #[test]
    fn negative_timeout_is_clamped_to_now() {
        let mut scheduler = Scheduler::default();
        scheduler.now_ms = 42;
        scheduler.set_timeout(TimerCallback::DeferredScrollReaction, -5);
        assert_eq!(scheduler.pending_timers()[0].due_at, 42);
    }
}

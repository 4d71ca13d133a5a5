use tracing::warn;

const MAX_FLUSH_PASSES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

type Check<S, C> = Box<dyn FnMut(&mut S, Option<&mut C>) -> bool>;

struct Watcher<S, C: ?Sized> {
    id: WatchId,
    check: Check<S, C>,
}

pub struct Store<S, C: ?Sized> {
    state: S,
    watchers: Vec<Watcher<S, C>>,
    next_id: u64,
}

impl<S, C: ?Sized> Store<S, C> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            watchers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn get(&self) -> &S {
        &self.state
    }

    pub fn watch<V, F, G>(&mut self, selector: F, mut callback: G) -> WatchId
    where
        V: PartialEq + 'static,
        F: Fn(&S) -> V + 'static,
        G: FnMut(&V, &mut S, &mut C) + 'static,
        S: 'static,
        C: 'static,
    {
        let mut last = selector(&self.state);
        let check: Check<S, C> = Box::new(move |state, ctx| {
            let current = selector(state);
            if current == last {
                return false;
            }
            let Some(ctx) = ctx else {
                last = current;
                return false;
            };
            callback(&current, state, ctx);
            last = current;
            true
        });

        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.watchers.push(Watcher { id, check });
        id
    }

    pub fn unwatch(&mut self, id: WatchId) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|watcher| watcher.id != id);
        self.watchers.len() != before
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn update<R>(&mut self, ctx: &mut C, mutate: impl FnOnce(&mut S) -> R) -> R {
        let result = mutate(&mut self.state);
        self.flush(ctx);
        result
    }

    pub fn update_untracked<R>(&mut self, mutate: impl FnOnce(&mut S) -> R) -> R {
        let result = mutate(&mut self.state);
        for watcher in &mut self.watchers {
            (watcher.check)(&mut self.state, None);
        }
        result
    }

    pub fn flush(&mut self, ctx: &mut C) {
        for _ in 0..MAX_FLUSH_PASSES {
            let mut fired = false;
            for watcher in &mut self.watchers {
                fired |= (watcher.check)(&mut self.state, Some(&mut *ctx));
            }
            if !fired {
                return;
            }
        }
        warn!(
            passes = MAX_FLUSH_PASSES,
            "watchers kept changing state; flush stopped early"
        );
    }
}

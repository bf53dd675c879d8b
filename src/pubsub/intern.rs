use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Weak,
};

use dashmap::{mapref::entry::Entry, DashMap};
use once_cell::sync::Lazy;

/// Порог, ниже которого пул не чистится.
const MIN_SWEEP_THRESHOLD: usize = 1024;

/// Пул имён каналов и шаблонов: push'и по одному каналу приходят
/// постоянно, и каждое сообщение разделяет один и тот же `Arc<str>`.
///
/// Пул держит только слабые ссылки. Имя живёт, пока живо хотя бы одно
/// сообщение с ним; мёртвые записи вычищаются при росте пула.
static NAME_POOL: Lazy<DashMap<Box<str>, Weak<str>>> = Lazy::new(DashMap::new);

/// Размер пула, при котором следующая вставка запустит чистку.
static SWEEP_AT: AtomicUsize = AtomicUsize::new(MIN_SWEEP_THRESHOLD);

/// Возвращает общий `Arc<str>` для имени канала.
///
/// Пока предыдущий `Arc` для этого имени жив, возвращается он же.
#[inline]
pub(crate) fn intern_name(name: &str) -> Arc<str> {
    if let Some(existing) = NAME_POOL.get(name).and_then(|w| w.upgrade()) {
        return existing;
    }

    let interned = match NAME_POOL.entry(Box::from(name)) {
        Entry::Occupied(mut slot) => match slot.get().upgrade() {
            Some(existing) => existing,
            None => {
                let fresh: Arc<str> = Arc::from(name);
                slot.insert(Arc::downgrade(&fresh));
                fresh
            }
        },
        Entry::Vacant(slot) => {
            let fresh: Arc<str> = Arc::from(name);
            slot.insert(Arc::downgrade(&fresh));
            fresh
        }
    };

    maybe_sweep();
    interned
}

/// Удаляет записи без живых сообщений, когда пул вырос вдвое с прошлой
/// чистки.
fn maybe_sweep() {
    if NAME_POOL.len() < SWEEP_AT.load(Ordering::Relaxed) {
        return;
    }
    NAME_POOL.retain(|_, name| name.strong_count() > 0);
    let live = NAME_POOL.len();
    SWEEP_AT.store((live * 2).max(MIN_SWEEP_THRESHOLD), Ordering::Relaxed);
}

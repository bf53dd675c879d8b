use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use super::Message;
use crate::{
    config::{OverflowPolicy, QueueConfig},
    error::{RecvError, TryRecvError},
};

/// Канал уведомлений «появилось сообщение».
///
/// Уведомление не несёт сообщения: получив его, потребитель сам вызывает
/// [`PubSubMessageQueue::pop`]. Ёмкости в 1 достаточно.
pub type SignalSender = mpsc::Sender<()>;

/// Потокобезопасная FIFO-очередь pub/sub сообщений.
///
/// Связывает производителя (поток диспетчеризации соединения) и
/// потребителей приложения. Производитель никогда не блокируется:
/// сообщение либо сразу отдаётся самому старому ожидающему
/// [`MessageWaiter`], либо кладётся в буфер.
///
/// Буфер, ожидающие и сигнальные каналы защищены одним мьютексом и
/// меняются только вместе.
#[derive(Debug)]
pub struct PubSubMessageQueue {
    state: Mutex<QueueState>,
    config: QueueConfig,
    counters: QueueCounters,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<Message>,
    waiters: VecDeque<oneshot::Sender<Message>>,
    signals: Vec<SignalSender>,
}

#[derive(Debug, Default)]
struct QueueCounters {
    pushed: AtomicU64,
    delivered_to_waiters: AtomicU64,
    buffered: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
    abandoned_waiters: AtomicU64,
}

/// Снимок счётчиков очереди.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Всего вызовов `push`.
    pub pushed: u64,
    /// Сообщения, отданные ожидающим напрямую, минуя буфер.
    pub delivered_to_waiters: u64,
    /// Сообщения, положенные в буфер.
    pub buffered: u64,
    /// Сообщения, извлечённые из буфера (`pop` и `wait_for_message`).
    pub popped: u64,
    /// Сообщения, выброшенные при переполнении.
    pub dropped: u64,
    /// Ожидающие, брошенные до получения сообщения.
    pub abandoned_waiters: u64,
}

/// Handle, который разрешается следующим сообщением очереди.
///
/// Можно дождаться через `.await` или из обычного потока через
/// [`MessageWaiter::blocking_recv`]. Если handle уничтожен до доставки,
/// очередь отдаст сообщение следующему ожидающему или в буфер.
#[derive(Debug)]
#[must_use = "a waiter does nothing unless awaited or received from"]
pub struct MessageWaiter {
    inner: oneshot::Receiver<Message>,
}

impl PubSubMessageQueue {
    /// Создаёт неограниченную очередь.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Создаёт очередь с заданной конфигурацией.
    ///
    /// Нулевая ёмкость трактуется как 1.
    pub fn with_config(mut config: QueueConfig) -> Self {
        config.capacity = config.capacity.map(|c| c.max(1));
        Self {
            state: Mutex::new(QueueState::default()),
            config,
            counters: QueueCounters::default(),
        }
    }

    /// Кладёт сообщение в очередь.
    ///
    /// Если есть ожидающий, сообщение уходит самому старому из них и в
    /// буфер не попадает. Иначе добавляется в конец буфера. В обоих
    /// случаях все сигнальные каналы уведомляются без блокировки:
    /// заполненный канал пропускается.
    pub fn push(
        &self,
        mut message: Message,
    ) {
        self.counters.pushed.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();

        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(message) {
                Ok(()) => {
                    self.counters
                        .delivered_to_waiters
                        .fetch_add(1, Ordering::Relaxed);
                    notify_signals(&mut state.signals);
                    return;
                }
                Err(returned) => {
                    // Receiver уничтожен: забираем сообщение обратно.
                    self.counters
                        .abandoned_waiters
                        .fetch_add(1, Ordering::Relaxed);
                    trace!(channel = %returned.channel(), "skipping abandoned waiter");
                    message = returned;
                }
            }
        }

        self.enqueue(&mut state, message);
        notify_signals(&mut state.signals);
    }

    /// Извлекает самое старое сообщение из буфера без ожидания.
    pub fn pop(&self) -> Option<Message> {
        let message = self.state.lock().messages.pop_front();
        if message.is_some() {
            self.counters.popped.fetch_add(1, Ordering::Relaxed);
        }
        message
    }

    /// Возвращает handle на следующее сообщение.
    ///
    /// При непустом буфере handle уже содержит самое старое сообщение
    /// (оно удаляется из буфера). Иначе регистрируется новый ожидающий;
    /// ожидающие обслуживаются в порядке регистрации.
    pub fn wait_for_message(&self) -> MessageWaiter {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();

        match state.messages.pop_front() {
            Some(message) => {
                self.counters.popped.fetch_add(1, Ordering::Relaxed);
                // rx жив, отправка не может провалиться
                let _ = tx.send(message);
            }
            None => {
                // Брошенные по таймауту ожидающие без push'ей иначе копятся.
                prune_abandoned(&mut state.waiters, &self.counters);
                state.waiters.push_back(tx);
            }
        }

        MessageWaiter { inner: rx }
    }

    /// Асинхронно ждёт следующее сообщение.
    ///
    /// Отмена future (например по `tokio::time::timeout`) не теряет
    /// последующих сообщений.
    pub async fn recv(&self) -> Result<Message, RecvError> {
        self.wait_for_message().await
    }

    /// Регистрирует постоянный канал уведомлений.
    ///
    /// Если буфер уже не пуст, канал сразу получает одно уведомление,
    /// чтобы потребитель не пропустил накопленные сообщения.
    pub fn register_signal_channel(
        &self,
        signal: SignalSender,
    ) {
        let mut state = self.state.lock();
        if !state.messages.is_empty() {
            let _ = signal.try_send(());
        }
        state.signals.push(signal);
    }

    /// Удаляет ранее зарегистрированный канал уведомлений.
    ///
    /// Возвращает `true`, если канал был найден.
    pub fn unregister_signal_channel(
        &self,
        signal: &SignalSender,
    ) -> bool {
        let mut state = self.state.lock();
        match state.signals.iter().position(|s| s.same_channel(signal)) {
            Some(idx) => {
                state.signals.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Количество сообщений в буфере.
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().messages.is_empty()
    }

    /// Количество живых ожидающих.
    pub fn waiter_count(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|w| !w.is_closed())
            .count()
    }

    pub fn signal_count(&self) -> usize {
        self.state.lock().signals.len()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            delivered_to_waiters: self.counters.delivered_to_waiters.load(Ordering::Relaxed),
            buffered: self.counters.buffered.load(Ordering::Relaxed),
            popped: self.counters.popped.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            abandoned_waiters: self.counters.abandoned_waiters.load(Ordering::Relaxed),
        }
    }

    fn enqueue(
        &self,
        state: &mut QueueState,
        message: Message,
    ) {
        if let Some(capacity) = self.config.capacity {
            if state.messages.len() >= capacity {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                match self.config.overflow_policy {
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = state.messages.pop_front() {
                            warn!(
                                channel = %evicted.channel(),
                                capacity,
                                "message queue full, dropping oldest message"
                            );
                        }
                    }
                    OverflowPolicy::DropNewest => {
                        warn!(
                            channel = %message.channel(),
                            capacity,
                            "message queue full, dropping incoming message"
                        );
                        return;
                    }
                }
            }
        }

        trace!(channel = %message.channel(), "message buffered");
        state.messages.push_back(message);
        self.counters.buffered.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for PubSubMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Удаляет ожидающих, чей receiver уже уничтожен.
fn prune_abandoned(
    waiters: &mut VecDeque<oneshot::Sender<Message>>,
    counters: &QueueCounters,
) {
    let before = waiters.len();
    waiters.retain(|w| !w.is_closed());
    let pruned = before - waiters.len();
    if pruned > 0 {
        counters
            .abandoned_waiters
            .fetch_add(pruned as u64, Ordering::Relaxed);
    }
}

/// Будит все сигнальные каналы; закрытые (receiver уничтожен) удаляются.
fn notify_signals(signals: &mut Vec<SignalSender>) {
    signals.retain(|signal| match signal.try_send(()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
        Err(mpsc::error::TrySendError::Closed(())) => false,
    });
}

impl MessageWaiter {
    /// Блокирующее ожидание для кода вне async runtime.
    ///
    /// # Panics
    /// Паникует при вызове из асинхронного контекста (ограничение tokio).
    pub fn blocking_recv(self) -> Result<Message, RecvError> {
        self.inner.blocking_recv().map_err(Into::into)
    }

    /// Проверяет, доставлено ли сообщение, не ожидая.
    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }
}

impl Future for MessageWaiter {
    type Output = Result<Message, RecvError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::timeout;

    use super::*;

    fn msg(
        channel: &str,
        payload: &'static str,
    ) -> Message {
        Message::new(channel, payload)
    }

    /// Тест проверяет базовый сценарий: push, pop, затем пусто.
    #[test]
    fn test_push_then_pop() {
        let queue = PubSubMessageQueue::new();
        queue.push(msg("c1", "hello"));

        assert_eq!(queue.pop(), Some(msg("c1", "hello")));
        assert_eq!(queue.pop(), None);
    }

    /// Тест проверяет порядок FIFO для нескольких сообщений.
    #[test]
    fn test_fifo_order() {
        let queue = PubSubMessageQueue::new();
        for i in 0..5 {
            queue.push(Message::new("c", format!("m{i}")));
        }
        assert_eq!(queue.len(), 5);

        for i in 0..5 {
            assert_eq!(queue.pop().unwrap().payload_str(), Some(format!("m{i}").as_str()));
        }
        assert!(queue.is_empty());
    }

    /// Тест проверяет, что ожидание при непустом буфере разрешается сразу
    /// и удаляет сообщение из буфера.
    #[tokio::test]
    async fn test_wait_with_backlog_resolves_immediately() {
        let queue = PubSubMessageQueue::new();
        queue.push(msg("c", "first"));
        queue.push(msg("c", "second"));

        let mut waiter = queue.wait_for_message();
        assert_eq!(waiter.try_recv(), Ok(msg("c", "first")));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(msg("c", "second")));
    }

    /// Тест проверяет прямую передачу ожидающему: сообщение не попадает
    /// в буфер.
    #[tokio::test]
    async fn test_wait_then_push_bypasses_buffer() {
        let queue = PubSubMessageQueue::new();
        let mut waiter = queue.wait_for_message();
        assert_eq!(waiter.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(queue.waiter_count(), 1);

        queue.push(msg("c2", "x"));

        let got = timeout(Duration::from_millis(100), waiter)
            .await
            .expect("timed out")
            .expect("queue closed");
        assert_eq!(got, msg("c2", "x"));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.stats().delivered_to_waiters, 1);
        assert_eq!(queue.stats().buffered, 0);
    }

    /// Тест проверяет обслуживание ожидающих в порядке регистрации.
    #[tokio::test]
    async fn test_waiters_served_in_registration_order() {
        let queue = PubSubMessageQueue::new();
        let w1 = queue.wait_for_message();
        let w2 = queue.wait_for_message();

        queue.push(msg("c", "p1"));
        queue.push(msg("c", "p2"));

        assert_eq!(w1.await.unwrap(), msg("c", "p1"));
        assert_eq!(w2.await.unwrap(), msg("c", "p2"));
    }

    /// Тест проверяет, что брошенный ожидающий не «съедает» сообщение.
    #[tokio::test]
    async fn test_abandoned_waiter_is_skipped() {
        let queue = PubSubMessageQueue::new();
        let abandoned = queue.wait_for_message();
        let live = queue.wait_for_message();
        drop(abandoned);
        assert_eq!(queue.waiter_count(), 1);

        queue.push(msg("c", "kept"));
        assert_eq!(live.await.unwrap(), msg("c", "kept"));

        let abandoned = queue.wait_for_message();
        drop(abandoned);
        queue.push(msg("c", "buffered"));
        assert_eq!(queue.pop(), Some(msg("c", "buffered")));
        assert_eq!(queue.stats().abandoned_waiters, 2);
    }

    /// Тест проверяет, что цикл `recv` с таймаутом на тихом канале не
    /// накапливает брошенных ожидающих.
    #[tokio::test]
    async fn test_timed_out_waiters_do_not_accumulate() {
        let queue = PubSubMessageQueue::new();
        for _ in 0..1_000 {
            let res = timeout(Duration::from_nanos(1), queue.recv()).await;
            assert!(res.is_err());
        }

        assert!(queue.state.lock().waiters.len() <= 1);
        assert_eq!(queue.waiter_count(), 0);
        assert!(queue.stats().abandoned_waiters >= 999);

        queue.push(msg("c", "after quiet period"));
        assert_eq!(queue.pop(), Some(msg("c", "after quiet period")));
    }

    /// Тест проверяет, что отменённый по таймауту `recv` не теряет
    /// следующее сообщение.
    #[tokio::test]
    async fn test_recv_timeout_does_not_lose_message() {
        let queue = PubSubMessageQueue::new();
        let res = timeout(Duration::from_millis(10), queue.recv()).await;
        assert!(res.is_err());

        queue.push(msg("c", "after-timeout"));
        assert_eq!(queue.pop(), Some(msg("c", "after-timeout")));
    }

    /// Тест проверяет ошибку `Closed`, если очередь уничтожена раньше
    /// доставки.
    #[tokio::test]
    async fn test_waiter_closed_when_queue_dropped() {
        let queue = PubSubMessageQueue::new();
        let waiter = queue.wait_for_message();
        drop(queue);
        assert_eq!(waiter.await, Err(RecvError::Closed));
    }

    /// Тест проверяет немедленное уведомление при регистрации сигнального
    /// канала на непустой очереди.
    #[tokio::test]
    async fn test_register_signal_with_backlog_notifies() {
        let queue = PubSubMessageQueue::new();
        queue.push(msg("c", "backlog"));

        let (tx, mut rx) = mpsc::channel(1);
        queue.register_signal_channel(tx);
        assert_eq!(rx.try_recv(), Ok(()));
    }

    #[tokio::test]
    async fn test_register_signal_on_empty_queue_is_silent() {
        let queue = PubSubMessageQueue::new();
        let (tx, mut rx) = mpsc::channel(1);
        queue.register_signal_channel(tx);
        assert!(rx.try_recv().is_err());

        queue.push(msg("c", "x"));
        assert_eq!(rx.try_recv(), Ok(()));
    }

    /// Тест проверяет, что сигнал приходит и при прямой передаче
    /// ожидающему.
    #[tokio::test]
    async fn test_signal_on_direct_handoff() {
        let queue = PubSubMessageQueue::new();
        let (tx, mut rx) = mpsc::channel(1);
        queue.register_signal_channel(tx);

        let waiter = queue.wait_for_message();
        queue.push(msg("c", "direct"));

        assert_eq!(rx.try_recv(), Ok(()));
        assert_eq!(waiter.await.unwrap(), msg("c", "direct"));
    }

    /// Тест проверяет, что push не блокируется на заполненном сигнальном
    /// канале.
    #[test]
    fn test_push_with_full_signal_channel_does_not_block() {
        let queue = PubSubMessageQueue::new();
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send(()).unwrap();
        queue.register_signal_channel(tx);

        for i in 0..100 {
            queue.push(Message::new("c", format!("{i}")));
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.signal_count(), 1);
    }

    /// Тест проверяет удаление сигнальных каналов: явное и ленивое
    /// (receiver уничтожен).
    #[test]
    fn test_unregister_and_prune_signals() {
        let queue = PubSubMessageQueue::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, rx2) = mpsc::channel(1);
        queue.register_signal_channel(tx1.clone());
        queue.register_signal_channel(tx2);
        assert_eq!(queue.signal_count(), 2);

        assert!(queue.unregister_signal_channel(&tx1));
        assert!(!queue.unregister_signal_channel(&tx1));

        drop(rx2);
        queue.push(msg("c", "x"));
        assert_eq!(queue.signal_count(), 0);
    }

    /// Тест проверяет политику DropOldest ограниченной очереди.
    #[test]
    fn test_bounded_drop_oldest() {
        let queue =
            PubSubMessageQueue::with_config(QueueConfig::bounded(2, OverflowPolicy::DropOldest));
        queue.push(msg("c", "a"));
        queue.push(msg("c", "b"));
        queue.push(msg("c", "c"));

        assert_eq!(queue.pop(), Some(msg("c", "b")));
        assert_eq!(queue.pop(), Some(msg("c", "c")));
        assert_eq!(queue.stats().dropped, 1);
    }

    #[test]
    fn test_bounded_drop_newest() {
        let queue =
            PubSubMessageQueue::with_config(QueueConfig::bounded(2, OverflowPolicy::DropNewest));
        queue.push(msg("c", "a"));
        queue.push(msg("c", "b"));
        queue.push(msg("c", "c"));

        assert_eq!(queue.pop(), Some(msg("c", "a")));
        assert_eq!(queue.pop(), Some(msg("c", "b")));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.stats().dropped, 1);
    }

    /// Ожидающие не ограничены ёмкостью буфера.
    #[tokio::test]
    async fn test_bounded_queue_still_hands_off_to_waiters() {
        let queue =
            PubSubMessageQueue::with_config(QueueConfig::bounded(1, OverflowPolicy::DropNewest));
        queue.push(msg("c", "buffered"));
        let waiter = queue.wait_for_message();
        let next = queue.wait_for_message();
        queue.push(msg("c", "direct"));

        assert_eq!(waiter.await.unwrap(), msg("c", "buffered"));
        assert_eq!(next.await.unwrap(), msg("c", "direct"));
        assert_eq!(queue.stats().dropped, 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue =
            PubSubMessageQueue::with_config(QueueConfig::bounded(0, OverflowPolicy::DropOldest));
        assert_eq!(queue.config().capacity, Some(1));
        queue.push(msg("c", "a"));
        queue.push(msg("c", "b"));
        assert_eq!(queue.pop(), Some(msg("c", "b")));
    }

    /// Тест проверяет доставку из другого потока в блокирующего
    /// потребителя.
    #[test]
    fn test_blocking_recv_across_threads() {
        let queue = Arc::new(PubSubMessageQueue::new());
        let waiter = queue.wait_for_message();

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.push(msg("c2", "x")))
        };

        assert_eq!(waiter.blocking_recv(), Ok(msg("c2", "x")));
        producer.join().unwrap();
        assert_eq!(queue.pop(), None);
    }

    /// Тест проверяет, что конкурентные производители не теряют сообщений
    /// и сохраняют порядок каждого отдельного производителя.
    #[test]
    fn test_concurrent_producers_preserve_per_producer_order() {
        let queue = Arc::new(PubSubMessageQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.push(Message::new(format!("p{p}"), format!("{i}")));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let mut last = [-1_i64; 4];
        let mut total = 0;
        while let Some(m) = queue.pop() {
            let p: usize = m.channel()[1..].parse().unwrap();
            let i: i64 = m.payload_str().unwrap().parse().unwrap();
            assert!(i > last[p], "producer {p} out of order");
            last[p] = i;
            total += 1;
        }
        assert_eq!(total, 1000);
        assert_eq!(queue.stats().pushed, 1000);
    }
}

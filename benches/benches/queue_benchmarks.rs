use std::{hint::black_box, sync::Arc};

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use pubsub_handoff::{
    CallbackContext, Message, MessageHandler, OverflowPolicy, PubSubMessageQueue, QueueConfig,
};

fn sample() -> Message {
    Message::new("bench.channel", Bytes::from_static(b"payload"))
}

fn bench_push_pop(c: &mut Criterion) {
    let queue = PubSubMessageQueue::new();
    c.bench_function("push_pop", |b| {
        b.iter(|| {
            queue.push(black_box(sample()));
            black_box(queue.pop());
        })
    });
}

fn bench_push_into_backlog(c: &mut Criterion) {
    c.bench_function("push_1000_then_drain", |b| {
        b.iter_batched(
            PubSubMessageQueue::new,
            |queue| {
                for _ in 0..1000 {
                    queue.push(sample());
                }
                while queue.pop().is_some() {}
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_bounded_overflow(c: &mut Criterion) {
    // буфер всегда полон, каждый push вытесняет самое старое
    let queue =
        PubSubMessageQueue::with_config(QueueConfig::bounded(64, OverflowPolicy::DropOldest));
    for _ in 0..64 {
        queue.push(sample());
    }
    c.bench_function("push_bounded_drop_oldest", |b| {
        b.iter(|| queue.push(black_box(sample())))
    });
}

fn bench_direct_handoff(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let queue = PubSubMessageQueue::new();
    c.bench_function("waiter_handoff", |b| {
        b.iter(|| {
            let waiter = queue.wait_for_message();
            queue.push(sample());
            black_box(rt.block_on(waiter).unwrap());
        })
    });
}

fn bench_signal_fanout(c: &mut Criterion) {
    let queue = PubSubMessageQueue::new();
    let _receivers: Vec<_> = (0..16)
        .map(|_| {
            let (tx, rx) = tokio::sync::mpsc::channel(1);
            queue.register_signal_channel(tx);
            rx
        })
        .collect();
    c.bench_function("push_pop_16_signals", |b| {
        b.iter(|| {
            queue.push(black_box(sample()));
            black_box(queue.pop());
        })
    });
}

fn bench_callback_dispatch(c: &mut Criterion) {
    let ctx: CallbackContext = Arc::new(());
    let handler = MessageHandler::with_callback(
        |msg, _| {
            black_box(msg);
        },
        ctx,
    );
    c.bench_function("callback_dispatch", |b| {
        b.iter(|| handler.handle_message(black_box(sample())))
    });
}

criterion_group!(
    benches,
    bench_push_pop,
    bench_push_into_backlog,
    bench_bounded_overflow,
    bench_direct_handoff,
    bench_signal_fanout,
    bench_callback_dispatch,
);
criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ppewatch::ConversationController;
use std::hint::black_box;

/// Answers arriving in reverse order force every insert into the middle of the transcript
fn reverse_completion(questions: usize) -> usize {
    let mut conversation = ConversationController::new();
    let tickets: Vec<_> = (0..questions)
        .filter_map(|i| conversation.submit(&format!("question {i}")))
        .collect();

    for ticket in tickets.iter().rev() {
        conversation.complete(ticket.sequence, Ok(String::from("answer")));
    }

    conversation.transcript().len()
}

fn bench_transcript(c: &mut Criterion) {
    let mut group = c.benchmark_group("transcript_reverse_completion");
    for size in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| reverse_completion(black_box(size)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transcript);
criterion_main!(benches);

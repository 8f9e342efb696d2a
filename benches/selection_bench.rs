use criterion::{black_box, criterion_group, criterion_main, Criterion};

use finportal::loans::selection::SelectionSet;
use finportal::loans::{Loan, LoanAnalysis};

fn bench_aggregate_total(c: &mut Criterion) {
    let analysis = LoanAnalysis {
        emprestimos: (0..1_000)
            .map(|i| Loan {
                id: i.to_string(),
                valor_a_vencer: f64::from(i),
                ..Loan::default()
            })
            .collect(),
        ..LoanAnalysis::default()
    };

    let mut selection = SelectionSet::new();
    for i in (0..1_000).step_by(2) {
        selection.toggle(&i.to_string());
    }

    c.bench_function("selection_total_1k_loans", |b| {
        b.iter(|| black_box(selection.total(&analysis)))
    });
}

criterion_group!(benches, bench_aggregate_total);
criterion_main!(benches);

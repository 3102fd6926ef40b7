//! Benchmarks for the hart tick loop.
//!
//! Run with: cargo bench -p rv32i-sim --bench step_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rv32i_sim::hart::{assemble_add, assemble_addi, assemble_bne, assemble_ebreak};
use rv32i_sim::{Hart, Memory};

/// Build a countdown loop: x1 iterations of add/addi, then ebreak.
fn loop_program(iterations: i32) -> Vec<u32> {
    vec![
        assemble_addi(1, 0, iterations), // x1 = n
        assemble_add(3, 3, 1),           // x3 += x1
        assemble_addi(1, 1, -1),         // x1 -= 1
        assemble_bne(1, 0, -8),          // loop while x1 != 0
        assemble_ebreak(),
    ]
}

fn setup_memory(words: &[u32]) -> Memory {
    let mut mem = Memory::new(0x1000);
    for (i, w) in words.iter().enumerate() {
        mem.set32(i as u32 * 4, *w);
    }
    mem
}

fn bench_tick_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick-loop");

    for iterations in [16, 256, 1024].iter() {
        let program = loop_program(*iterations);

        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            iterations,
            |b, _| {
                b.iter(|| {
                    let mut mem = setup_memory(&program);
                    let mut hart = Hart::new(&mut mem);
                    hart.set_reg(3, 0);
                    while !hart.is_halted() {
                        hart.tick("");
                    }
                    black_box(hart.insn_counter())
                })
            },
        );
    }

    group.finish();
}

fn bench_single_exec(c: &mut Criterion) {
    c.bench_function("exec-addi", |b| {
        let mut mem = Memory::new(0x100);
        let mut hart = Hart::new(&mut mem);
        let insn = assemble_addi(1, 1, 1);
        b.iter(|| {
            hart.exec(black_box(insn), None);
        })
    });
}

criterion_group!(benches, bench_tick_loop, bench_single_exec);
criterion_main!(benches);

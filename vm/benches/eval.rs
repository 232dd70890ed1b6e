use std::sync::Arc;

use bytecode::op;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lisp::Value;
use vm::{Context, Func, Registry};

fn bench_constants(c: &mut Criterion) {
    let mut code = Vec::new();
    let tmpl = [
        op::CONSTANT0,
        op::CONSTANT0 + 1,
        op::CONSTANT0 + 2,
        op::CONSTANT0 + 3,
        op::CONSTANT0 + 4,
        op::CONSTANT0 + 5,
        op::DISCARD_B,
        6,
    ];
    for _ in 0..80 {
        code.extend_from_slice(&tmpl);
    }
    code.extend_from_slice(&op::STOP_TRAILER);

    let consts: Vec<Value> = (0..10).map(Value::int).collect();
    let main = Arc::new(Func::new(code, consts));
    let mut ctx = Context::new(Arc::new(Registry::new()));

    c.bench_function("eval_constants", |b| {
        b.iter(|| {
            let sp = ctx.eval(black_box(&main), 0).expect("eval");
            black_box(sp);
        })
    });
}

fn bench_stack_ops(c: &mut Criterion) {
    let mut code = Vec::new();
    let tmpl = [
        op::DUP,
        op::DUP,
        op::STACK_REF_B,
        0,
        op::STACK_REF_W,
        0,
        0,
        op::STACK_REF1,
        op::STACK_REF2,
        op::DISCARD,
        op::DISCARD,
        op::DISCARD_B,
        2,
        op::DISCARD_B,
        2,
    ];
    for _ in 0..60 {
        code.extend_from_slice(&tmpl);
    }
    code.extend_from_slice(&op::STOP_TRAILER);

    let main = Arc::new(Func::new(code, Vec::new()));
    let mut ctx = Context::new(Arc::new(Registry::new()));
    ctx.stack_mut()[0] = Value::int(0);

    c.bench_function("eval_stack_ops", |b| {
        b.iter(|| {
            let sp = ctx.eval(black_box(&main), 1).expect("eval");
            black_box(sp);
        })
    });
}

fn bench_calls(c: &mut Criterion) {
    let registry = Arc::new(Registry::new());

    let mut callee = registry
        .register_func("nop0", Func::new(vec![op::RETURN], vec![]));
    for i in 1..5 {
        callee = registry.register_func(
            &format!("nop{i}"),
            Func::new(
                vec![op::CONSTANT0, op::CALL0, op::RETURN],
                vec![callee],
            ),
        );
    }

    let mut code = Vec::new();
    let tmpl = [
        op::CONSTANT_W,
        0,
        0,
        op::CALL0,
        op::CONSTANT0,
        op::CALL0,
    ];
    for _ in 0..25 {
        code.extend_from_slice(&tmpl);
    }
    code.extend_from_slice(&op::STOP_TRAILER);

    let main = Arc::new(Func::new(code, vec![callee]));
    let mut ctx = Context::new(registry);

    c.bench_function("eval_calls", |b| {
        b.iter(|| {
            let sp = ctx.eval(black_box(&main), 0).expect("eval");
            black_box(sp);
        })
    });
}

criterion_group!(benches, bench_constants, bench_stack_ops, bench_calls);
criterion_main!(benches);

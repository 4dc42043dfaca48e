use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use arbor::{CallService, NodeId, Publish, Register, Subscribe, Tree, TreeConfig, Value};

/// Builds a `depth`-deep chain with `fanout` leaf siblings at every level.
/// Returns the tree and the deepest node.
fn make_tree(depth: usize, fanout: usize) -> (Tree, NodeId) {
    let mut tree = Tree::with_config(
        "bench",
        TreeConfig {
            trace_dispatch: false,
            ..TreeConfig::default()
        },
    );
    let mut cursor = tree.root();
    for level in 0..depth {
        for leaf in 0..fanout {
            tree.add_child(cursor, format!("leaf-{level}-{leaf}")).unwrap();
        }
        cursor = tree.add_child(cursor, format!("level-{level}")).unwrap();
    }
    (tree, cursor)
}

fn bench_bubbling_publish(c: &mut Criterion) {
    let (mut tree, deepest) = make_tree(16, 0);
    let root = tree.root();
    tree.subscribe(root, Subscribe::new("tick", |_| Ok(None))).unwrap();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));
    group.bench_function("bubble_depth16", |b| {
        b.iter(|| {
            let out = tree.publish(deepest, Publish::new("tick")).unwrap();
            black_box(out);
        });
    });
    group.finish();
}

fn bench_spreading_publish(c: &mut Criterion) {
    let (mut tree, _) = make_tree(8, 8);
    let root = tree.root();
    let ids: Vec<NodeId> = (1..tree.len()).map(NodeId::from_raw).collect();
    for id in ids {
        tree.subscribe(id, Subscribe::new("refresh", |_| Ok(None)).spreading(true).bubbling(false))
            .unwrap();
    }

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(tree.len() as u64));
    group.bench_function("spread_72_nodes", |b| {
        b.iter(|| {
            let out = tree
                .publish(root, Publish::new("refresh").capturing(false).bubbling(false))
                .unwrap();
            black_box(out);
        });
    });
    group.finish();
}

fn bench_local_fast_path(c: &mut Criterion) {
    let (mut tree, deepest) = make_tree(4, 0);
    c.bench_function("dispatch/local_fast_path", |b| {
        b.iter(|| {
            let out = tree
                .publish(deepest, Publish::new("noop").local().result_init(0).direct_result(true))
                .unwrap();
            black_box(out);
        });
    });
}

fn bench_service_call(c: &mut Criterion) {
    let (mut tree, deepest) = make_tree(8, 0);
    let root = tree.root();
    tree.register(
        root,
        Register::new("double", |inv| {
            Ok(Some(Value::Int(inv.arg(0).and_then(Value::as_int).unwrap_or(0) * 2)))
        }),
    )
    .unwrap();

    c.bench_function("service/call_depth8", |b| {
        b.iter(|| {
            let out = tree.call(deepest, CallService::new("double").arg(21)).unwrap();
            black_box(out);
        });
    });
}

fn bench_async_tick(c: &mut Criterion) {
    let (mut tree, deepest) = make_tree(8, 0);
    let root = tree.root();
    tree.subscribe(root, Subscribe::new("later", |_| Ok(None))).unwrap();

    let mut group = c.benchmark_group("scheduler");
    group.throughput(Throughput::Elements(64));
    group.bench_function("enqueue_and_tick_64", |b| {
        b.iter(|| {
            for _ in 0..64 {
                tree.publish(deepest, Publish::new("later").asynchronous(true)).unwrap();
            }
            black_box(tree.tick().unwrap());
        });
    });
    group.finish();
}

criterion_group!(
    dispatch,
    bench_bubbling_publish,
    bench_spreading_publish,
    bench_local_fast_path,
    bench_service_call,
    bench_async_tick
);
criterion_main!(dispatch);

use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use redlilium_geometry::{
    ArenaConfig, AttributeLayout, GeometryArena, GeometryBatch, GeometryDevice, RegistryConfig,
    StoreRegistry,
};

const MESH_VERTICES: u64 = 256;
const MESH_INDICES: u64 = 384;

fn mesh_bytes() -> (Vec<u8>, Vec<u8>) {
    let vertices = vec![0u8; (MESH_VERTICES * 12) as usize];
    let indices = vec![0u8; (MESH_INDICES * 4) as usize];
    (vertices, indices)
}

fn filled_arena(meshes: u64) -> GeometryArena {
    let (vertices, indices) = mesh_bytes();
    let mut arena = GeometryArena::new(
        GeometryDevice::dummy(),
        AttributeLayout::position_only(),
        4,
        ArenaConfig::new(),
    )
    .unwrap();
    for _ in 0..meshes {
        arena
            .add_geometry(MESH_VERTICES, &vertices, MESH_INDICES, &indices)
            .unwrap();
    }
    arena
}

// ---------------------------------------------------------------------------
// Arena growth
// ---------------------------------------------------------------------------

fn bench_add_geometry(c: &mut Criterion) {
    let (vertices, indices) = mesh_bytes();
    c.bench_function("arena_add_64_meshes", |b| {
        b.iter_batched(
            || filled_arena(0),
            |mut arena| {
                for _ in 0..64 {
                    black_box(
                        arena
                            .add_geometry(MESH_VERTICES, &vertices, MESH_INDICES, &indices)
                            .unwrap(),
                    );
                }
                arena
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_batch_upload(c: &mut Criterion) {
    let (vertices, indices) = mesh_bytes();
    c.bench_function("batch_upload_64_meshes", |b| {
        b.iter_batched(
            || filled_arena(0),
            |mut arena| {
                let mut batch = GeometryBatch::for_arena(&arena);
                for _ in 0..64 {
                    batch
                        .push(MESH_VERTICES, &vertices, MESH_INDICES, &indices)
                        .unwrap();
                }
                black_box(batch.upload(&mut arena).unwrap());
                arena
            },
            BatchSize::SmallInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Arena compaction
// ---------------------------------------------------------------------------

fn bench_remove_front(c: &mut Criterion) {
    c.bench_function("arena_remove_front_of_64", |b| {
        b.iter_batched(
            || filled_arena(64),
            |mut arena| {
                arena
                    .remove_geometry(0, MESH_VERTICES, 0, MESH_INDICES)
                    .unwrap();
                arena
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_remove_middle(c: &mut Criterion) {
    c.bench_function("arena_remove_middle_of_64", |b| {
        b.iter_batched(
            || filled_arena(64),
            |mut arena| {
                arena
                    .remove_geometry(
                        32 * MESH_VERTICES,
                        MESH_VERTICES,
                        32 * MESH_INDICES,
                        MESH_INDICES,
                    )
                    .unwrap();
                arena
            },
            BatchSize::SmallInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Registry lookup
// ---------------------------------------------------------------------------

fn bench_registry_lookup(c: &mut Criterion) {
    let mut registry = StoreRegistry::new(GeometryDevice::dummy(), RegistryConfig::new(4));
    let layout = AttributeLayout::position_normal_uv();
    registry.get_or_create(&layout).unwrap();

    c.bench_function("registry_get_or_create_existing", |b| {
        b.iter(|| {
            black_box(registry.get_or_create(black_box(&layout)).unwrap().vertex_count());
        });
    });
}

criterion_group!(
    benches,
    bench_add_geometry,
    bench_batch_upload,
    bench_remove_front,
    bench_remove_middle,
    bench_registry_lookup,
);
criterion_main!(benches);

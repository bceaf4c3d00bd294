use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use rexfs::prelude::*;

criterion_group!(benches, fat_bench, bitmap_bench);
criterion_main!(benches);

pub fn fat_bench(c: &mut Criterion) {
    let geometry = VolumeGeometry::default();

    c.bench_function("fat_initialize_reference", |b| {
        b.iter(|| FatTable::initialize(geometry.fat_entries).expect("initialize failed"));
    });

    c.bench_function("fat_allocate_chain_64k", |b| {
        b.iter_batched(
            || FatTable::initialize(1 << 20).expect("initialize failed"),
            |mut fat| fat.allocate_chain(65536).expect("allocate failed"),
            BatchSize::LargeInput,
        );
    });

    let mut fat = FatTable::initialize(1 << 20).expect("initialize failed");
    fat.allocate_chain(65536).expect("allocate failed");
    c.bench_function("fat_serialize_1m", |b| {
        b.iter(|| fat.to_bytes());
    });
}

pub fn bitmap_bench(c: &mut Criterion) {
    let geometry = VolumeGeometry::default();
    let mut fat = FatTable::initialize(geometry.fat_entries).expect("initialize failed");
    let mut bitmap = BitmapBuilder::from_fat(&fat);
    bitmap
        .reserve_bitmap(&mut fat, geometry.cluster_size())
        .expect("bitmap reserve failed");

    c.bench_function("bitmap_sync_reference", |b| {
        b.iter(|| bitmap.sync_from(&fat));
    });

    let tracked = bitmap.clone().with_conservative(false);
    c.bench_function("bitmap_render_reference", |b| {
        b.iter(|| tracked.render());
    });
}

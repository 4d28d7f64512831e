use criterion::{criterion_group, criterion_main, Criterion};
use index_core::{Pipeline, PipelineConfig};
use index_core::stemmer::StemmerKind;

const TEXT: &str = "El gobierno anunció este martes un nuevo paquete de medidas económicas \
destinadas a reactivar la industria nacional. Según el ministerio, las ayudas llegarán \
a más de diez mil pequeñas empresas durante los próximos meses, aunque los sindicatos \
consideran que la inversión pública sigue siendo insuficiente para el sector.";

fn bench_preprocess(c: &mut Criterion) {
    let text = TEXT.repeat(20);
    let snowball = Pipeline::new(PipelineConfig::default()).unwrap();
    let suffix = Pipeline::new(PipelineConfig { stemmer: StemmerKind::Suffix, ..Default::default() }).unwrap();
    c.bench_function("preprocess_snowball", |b| b.iter(|| snowball.preprocess(&text)));
    c.bench_function("preprocess_suffix", |b| b.iter(|| suffix.preprocess(&text)));
}

criterion_group!(benches, bench_preprocess);
criterion_main!(benches);

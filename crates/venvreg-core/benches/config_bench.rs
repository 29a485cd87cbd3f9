use criterion::{black_box, criterion_group, criterion_main, Criterion};
use venvreg_core::naming::{derive_sdk_name, parse_runtime_version};
use venvreg_core::VenvregConfig;

fn bench_config_parse(c: &mut Criterion) {
    let toml_text = r#"
[environment]
dir = ".venv"
runtime = "python"
default_version = "3.12"

[builder]
program = "uv"
args = ["venv", ".venv", "--seed"]
timeout_secs = 120

[registry]
path = "/home/dev/.config/venvreg/registry.toml"
"#;

    c.bench_function("parse_config", |b| {
        b.iter(|| {
            let _cfg: VenvregConfig = toml::from_str(black_box(toml_text)).unwrap();
        })
    });
}

fn bench_sdk_name(c: &mut Criterion) {
    let metadata = "home = /usr/local/bin\nimplementation = CPython\nversion = 3.12.4\n";

    c.bench_function("derive_sdk_name", |b| {
        b.iter(|| {
            let version = parse_runtime_version(black_box(metadata)).unwrap_or_default();
            derive_sdk_name("Python", &version, black_box("proj1"))
        })
    });
}

criterion_group!(benches, bench_config_parse, bench_sdk_name);
criterion_main!(benches);

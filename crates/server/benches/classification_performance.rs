use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use safarguard::crowd::detector::parse_detections;
use safarguard::crowd::uploads::sanitize_filename;
use safarguard::crowd::{Alert, AlertLog, classify, count_people};

// CI-friendly benchmark configuration
fn is_ci_mode() -> bool {
    std::env::var("CI").is_ok() || std::env::var("QUICK_BENCH").is_ok()
}

fn detector_output(n: usize) -> Vec<u8> {
    let items: Vec<String> = (0..n)
        .map(|i| {
            let label = if i % 3 == 0 { "backpack" } else { "person" };
            format!(r#"{{"label":"{label}","bbox":[1.0,2.0,30.0,80.0],"confidence":0.8}}"#)
        })
        .collect();
    format!("[{}]", items.join(",")).into_bytes()
}

fn benchmark_classification(c: &mut Criterion) {
    c.bench_function("classify_all_tiers", |b| {
        b.iter(|| {
            for n in 0..32u32 {
                black_box(classify(black_box(n)));
            }
        });
    });

    let labels: Vec<String> = (0..200)
        .map(|i| match i % 4 {
            0 => "Person".to_string(),
            1 => "person ".to_string(),
            2 => "handbag".to_string(),
            _ => "person".to_string(),
        })
        .collect();
    c.bench_function("count_people_200_labels", |b| {
        b.iter(|| count_people(black_box(&labels).iter().map(String::as_str)));
    });
}

fn benchmark_detector_parsing(c: &mut Criterion) {
    let small = detector_output(8);
    let large = detector_output(if is_ci_mode() { 100 } else { 500 });

    c.bench_function("parse_detections_small", |b| {
        b.iter(|| parse_detections(black_box(&small)));
    });
    c.bench_function("parse_detections_large", |b| {
        b.iter(|| parse_detections(black_box(&large)));
    });
}

fn benchmark_upload_names(c: &mut Criterion) {
    let names = [
        "IMG_20240301_081512.jpg",
        "../../etc/passwd",
        "coach photo (1).jpeg",
        "ಚಿತ್ರ.png",
    ];
    c.bench_function("sanitize_filename", |b| {
        b.iter(|| {
            for name in names {
                black_box(sanitize_filename(black_box(name)));
            }
        });
    });
}

fn benchmark_alert_log(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::TempDir::new().unwrap();
    let log = AlertLog::new(dir.path().join("alerts.json"));
    rt.block_on(log.init()).unwrap();

    let records = if is_ci_mode() { 100 } else { 1_000 };
    for i in 0..records {
        let tier = classify(i as u32 % 15);
        let alert = Alert {
            id: i,
            time: i,
            train: "Virar Fast".into(),
            compartment: "D3".into(),
            lat: "19.0760".into(),
            lon: "72.8777".into(),
            people_count: i as u32 % 15,
            status: tier.status().to_string(),
            tier: Some(tier),
            message: tier.message(i as u32 % 15),
            image: format!("{i}_frame.jpg"),
        };
        rt.block_on(log.append(&alert)).unwrap();
    }

    c.bench_function("alert_log_list", |b| {
        b.iter(|| rt.block_on(log.list()).unwrap());
    });
}

criterion_group!(
    benches,
    benchmark_classification,
    benchmark_detector_parsing,
    benchmark_upload_names,
    benchmark_alert_log
);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};

use pst_harvest::parser::{encoding, header, rtf};

fn bench_decode_bodies(c: &mut Criterion) {
    let utf8 = "Quarterly numbers attached. 분기 실적 첨부합니다.\n".repeat(200);
    let (euc_kr, _, _) = encoding_rs::EUC_KR.encode(&utf8);
    let (latin, _, _) = encoding_rs::WINDOWS_1252.encode(&"Grüße aus Köln, à bientôt.\n".repeat(200));

    c.bench_function("decode_utf8_body", |b| {
        b.iter(|| encoding::decode(utf8.as_bytes()))
    });
    c.bench_function("decode_euc_kr_body", |b| b.iter(|| encoding::decode(&euc_kr)));
    c.bench_function("decode_windows_1252_body", |b| {
        b.iter(|| encoding::decode(&latin))
    });
}

fn bench_recipients(c: &mut Criterion) {
    let raw = b"To: Bob <bob@x.com>, =?UTF-8?B?6rmA7LKg7IiY?= <kim@x.kr>\r\n\
                Cc: Carol <carol@x.com>, Bob <bob@x.com>, \"Doe, John\" <jd@x.com>\r\n";

    c.bench_function("parse_recipients", |b| b.iter(|| header::parse_recipients(raw)));
}

fn bench_rtf(c: &mut Criterion) {
    let body = format!(
        r"{{\rtf1\ansi\ansicpg949{{\fonttbl{{\f0 Gulim;}}}}{}}}",
        r"\f0 Meeting notes\par \'c7\'d1\'b1\'db \u54620?\par ".repeat(100)
    );

    c.bench_function("rtf_to_text", |b| b.iter(|| rtf::rtf_to_text(&body)));
}

criterion_group!(benches, bench_decode_bodies, bench_recipients, bench_rtf);
criterion_main!(benches);

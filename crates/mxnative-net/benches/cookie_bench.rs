// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the cookie encryption interceptor.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use http::Response;
use http::header::SET_COOKIE;

use mxnative_net::{CookieEncryptionInterceptor, SetCookie};
use mxnative_security::AesGcmCipher;

fn interceptor() -> CookieEncryptionInterceptor {
    let key = AesGcmCipher::generate_key().expect("key");
    let cipher = Arc::new(AesGcmCipher::new(&key).expect("cipher"));
    CookieEncryptionInterceptor::new("app.example.com", cipher)
}

/// Typical runtime response: session, xsrf and a device id cookie.
fn bench_encrypt_response(c: &mut Criterion) {
    let interceptor = interceptor();

    c.bench_function("encrypt_response (3 cookies)", |b| {
        b.iter(|| {
            let mut response = Response::builder()
                .header(SET_COOKIE, "xasid=0.6a1f4c2e-9b1d-4a7f; Path=/; HttpOnly")
                .header(SET_COOKIE, "XASSESSIONID=ab12cd34; Path=/; Secure; HttpOnly")
                .header(SET_COOKIE, "DeviceType=Phone; Path=/")
                .body(())
                .expect("response");
            interceptor.encrypt_response(&mut response).expect("encrypt");
            black_box(response);
        });
    });
}

fn bench_decrypt_header(c: &mut Criterion) {
    let interceptor = interceptor();
    let header = ["xasid", "XASSESSIONID", "DeviceType"]
        .iter()
        .map(|name| {
            let (encrypted, _) = interceptor
                .encrypt_cookie(&SetCookie::new(*name, "value-0123456789"))
                .expect("encrypt");
            format!("{}={}", encrypted.name, encrypted.value)
        })
        .collect::<Vec<_>>()
        .join("; ");

    c.bench_function("decrypt_cookie_header (3 cookies)", |b| {
        b.iter(|| black_box(interceptor.decrypt_cookie_header(black_box(&header)).expect("decrypt")));
    });
}

criterion_group!(benches, bench_encrypt_response, bench_decrypt_header);
criterion_main!(benches);

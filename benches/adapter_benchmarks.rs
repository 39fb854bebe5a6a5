/// Criterion benchmarks for the adapter layer
///
/// Measures request building, path extraction, response parsing and stream
/// handling, plus one full chat round trip against a mock server.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ai_facade::{
    AiClient, ChatInput, ChatOptions, HistoryTurn, ModerationOptions, ProviderKind, ReqwestTransport,
    ServiceConfig, adapter_for,
    json_path::{JsonPath, first_non_blank},
    moderation::parse_category_scores,
    schema::{Described, FieldDescriptor, RecordDescriptor, TypeDescriptor, build_schema, parse},
    stream::parse_sse_line,
};
use rand::{Rng, distributions::Alphanumeric};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{method, path}};

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Invoice {
    number: String,
    total: f64,
    lines: Vec<InvoiceLine>,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct InvoiceLine {
    description: String,
    quantity: u32,
}

impl Described for Invoice {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Record(RecordDescriptor::new("Invoice", || {
            vec![
                FieldDescriptor::of::<String>("number"),
                FieldDescriptor::of::<f64>("total"),
                FieldDescriptor::of::<Vec<InvoiceLine>>("lines"),
            ]
        }))
    }
}

impl Described for InvoiceLine {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Record(RecordDescriptor::new("InvoiceLine", || {
            vec![
                FieldDescriptor::of::<String>("description"),
                FieldDescriptor::of::<u32>("quantity"),
            ]
        }))
    }
}

fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn service_for(kind: ProviderKind) -> ServiceConfig {
    let model = match kind {
        ProviderKind::OpenAi | ProviderKind::OpenAiResponses => "gpt-5-mini",
        ProviderKind::Anthropic => "claude-sonnet-4-5",
        ProviderKind::Google => "gemini-2.5-flash",
        ProviderKind::Ollama => "llama3.2",
        ProviderKind::OpenRouter => "openai/gpt-4o",
        ProviderKind::Meta => "Llama-4-Maverick-17B-128E-Instruct-FP8",
        ProviderKind::Mistral => "mistral-large-latest",
    };
    ServiceConfig::new(kind, model, "bench-key")
}

/// Benchmark payload building for every provider
fn bench_build_payload(c: &mut Criterion) {
    let mut builder = ChatInput::builder().message(random_text(2000));
    for i in 0..10 {
        builder = builder.history(if i % 2 == 0 {
            HistoryTurn::user(random_text(200))
        } else {
            HistoryTurn::assistant(random_text(400))
        });
    }
    let input = builder.build().unwrap();
    let options = ChatOptions::builder()
        .system_prompt("You are a benchmark")
        .max_tokens(512)
        .json_schema(build_schema::<Invoice>().unwrap())
        .build()
        .unwrap();

    let mut group = c.benchmark_group("build_payload");
    for kind in ProviderKind::ALL {
        let service = service_for(kind);
        let adapter = adapter_for(kind);
        group.bench_with_input(BenchmarkId::new("provider", kind.name()), &service, |b, service| {
            b.iter(|| {
                let payload = adapter.build_chat_payload(service, &input, &options, false).unwrap();
                black_box(payload);
            });
        });
    }
    group.finish();
}

/// Benchmark JSON path extraction with and without wildcards
fn bench_path_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_extraction");
    for parts in [1usize, 10, 100] {
        let doc = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": (0..parts).map(|_| json!({"type": "output_text", "text": random_text(16)})).collect::<Vec<_>>()}
            ]
        });
        let wildcard = JsonPath::parse("output[*].content[*].text").unwrap();
        group.bench_with_input(BenchmarkId::new("wildcard", parts), &doc, |b, doc| {
            b.iter(|| black_box(wildcard.find_all(doc)));
        });
        group.bench_with_input(BenchmarkId::new("fallback", parts), &doc, |b, doc| {
            b.iter(|| black_box(first_non_blank(doc, &["choices[0].message.content", "output[1].content[0].text"]).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark non-streaming response parsing
fn bench_parse_response(c: &mut Criterion) {
    let content = random_text(4000);
    let bodies = [
        (
            ProviderKind::OpenAi,
            json!({"choices": [{"message": {"content": content}, "finish_reason": "stop"}]}),
        ),
        (
            ProviderKind::OpenAiResponses,
            json!({"status": "completed", "output": [{"type": "message", "content": [{"type": "output_text", "text": content}]}]}),
        ),
        (
            ProviderKind::Anthropic,
            json!({"content": [{"type": "text", "text": content}], "stop_reason": "end_turn"}),
        ),
        (
            ProviderKind::Google,
            json!({"candidates": [{"content": {"parts": [{"text": content}]}, "finishReason": "STOP"}]}),
        ),
    ];

    let mut group = c.benchmark_group("parse_response");
    for (kind, body) in &bodies {
        let body = body.to_string();
        let adapter = adapter_for(*kind);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("provider", kind.name()), &body, |b, body| {
            b.iter(|| black_box(adapter.parse_chat_response(body).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark stream line tokenizing and event handling
fn bench_stream_events(c: &mut Criterion) {
    let lines: Vec<String> = (0..200)
        .map(|_| {
            let chunk = json!({"choices": [{"delta": {"content": random_text(8)}}]});
            format!("data: {}", chunk)
        })
        .collect();
    let adapter = adapter_for(ProviderKind::OpenAi);

    c.bench_function("openai_stream_200_chunks", |b| {
        b.iter(|| {
            let mut received = 0usize;
            for line in &lines {
                if let Some(event) = parse_sse_line(line) {
                    adapter
                        .process_chat_stream_event(&event, &mut |t: &str| received += t.len())
                        .unwrap();
                }
            }
            black_box(received);
        });
    });
}

/// Benchmark schema generation and validating decode
fn bench_schema(c: &mut Criterion) {
    let invoice = json!({
        "number": "INV-1",
        "total": 99.5,
        "lines": (0..50).map(|i| json!({"description": random_text(30), "quantity": i})).collect::<Vec<_>>()
    })
    .to_string();

    c.bench_function("schema_build", |b| {
        b.iter(|| black_box(build_schema::<Invoice>().unwrap().strict()));
    });
    c.bench_function("schema_parse_invoice", |b| {
        b.iter(|| black_box(parse::<Invoice>(&invoice).unwrap()));
    });
}

fn bench_moderation_scores(c: &mut Criterion) {
    let options = ModerationOptions::default();
    let scores = json!({
        "harassment": 0.1, "hate": 0.05, "illicit": 0.0, "self-harm": 0.01,
        "sexual": 0.2, "violence": 0.7, "violence/graphic": 0.3
    });
    c.bench_function("moderation_scores", |b| {
        b.iter(|| black_box(parse_category_scores(&scores, &options).unwrap().highest_category().map(|(name, _)| name.len())));
    });
}

/// Benchmark a full chat round trip through the reqwest transport
fn bench_chat_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Benchmark response"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;
        server
    });

    let service = ServiceConfig::new(ProviderKind::OpenAi, "gpt-4o", "bench-key").with_endpoint(server.uri());
    let client = AiClient::new(service, Arc::new(ReqwestTransport::new().unwrap()));
    let input = ChatInput::text("Benchmark test").unwrap();
    let options = ChatOptions::default();

    c.bench_function("chat_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reply = client.chat(&input, &options).await.unwrap();
                black_box(reply);
            })
        });
    });
}

criterion_group!(
    benches,
    bench_build_payload,
    bench_path_extraction,
    bench_parse_response,
    bench_stream_events,
    bench_schema,
    bench_moderation_scores,
    bench_chat_round_trip
);

criterion_main!(benches);

#![allow(dead_code, clippy::uninlined_format_args)]
//! 服务注册表的性能基准测试

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use service_registry::{
    ClientLifetime, Component, Constructor, Declarations, FactoryMethod, Injectable, Overrides, Progress,
    ServiceRegistry,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

trait Lookup: Send + Sync {
    fn value(&self) -> u64;
}

/// 测试用的简单服务
struct SimpleService {
    value: u64,
}

impl Lookup for SimpleService {
    fn value(&self) -> u64 {
        self.value
    }
}

impl Component for SimpleService {
    fn declare(decl: &mut Declarations<Self>) {
        decl.alias::<dyn Lookup>(|service| service);
    }
}

/// 带依赖的服务
struct DependentService {
    lookup: Arc<dyn Lookup>,
}

impl Component for DependentService {}

impl Injectable for DependentService {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(DependentService {
                lookup: args.next::<dyn Lookup>()?,
            })
        })
        .param::<dyn Lookup>()]
    }
}

struct NoopParticipant;

#[async_trait]
impl ClientLifetime for NoopParticipant {
    async fn run_startup(&self, _progress: &Progress) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run_shutdown(&self, _progress: &Progress) -> anyhow::Result<()> {
        Ok(())
    }
}

fn populated_registry() -> ServiceRegistry {
    let registry = ServiceRegistry::new();
    registry
        .register_instance(SimpleService { value: 42 })
        .expect("register instance");
    registry
}

/// 基准测试：已构造实例的解析
fn bench_instance_resolution(c: &mut Criterion) {
    let registry = populated_registry();
    let mut group = c.benchmark_group("instance_resolution");

    group.bench_function("concrete", |b| {
        b.iter(|| black_box(registry.get::<SimpleService>().expect("resolve").value))
    });
    group.bench_function("alias", |b| {
        b.iter(|| black_box(registry.get::<dyn Lookup>().expect("resolve").value()))
    });
    group.finish();
}

/// 基准测试：工厂首次解析
fn bench_factory_first_resolution(c: &mut Criterion) {
    c.bench_function("factory_first_resolution", |b| {
        b.iter(|| {
            let registry = ServiceRegistry::new();
            registry
                .register_factory_method(FactoryMethod::producing(|_| Ok(SimpleService { value: 1 })))
                .expect("register factory");
            black_box(registry.get::<dyn Lookup>().expect("resolve").value())
        })
    });
}

/// 基准测试：构造函数注入
fn bench_construct(c: &mut Criterion) {
    let registry = populated_registry();
    c.bench_function("construct_with_injection", |b| {
        b.iter(|| {
            let service = registry
                .construct::<DependentService>(Overrides::new())
                .expect("construct");
            black_box(service.lookup.value())
        })
    });
}

/// 基准测试：客户端启动流程
fn bench_client_startup(c: &mut Criterion) {
    let runtime = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("client_startup");

    for count in [1usize, 10, 100] {
        let registry = ServiceRegistry::new();
        for _ in 0..count {
            registry
                .lifetimes()
                .register_for_client_lifetime(Arc::new(NoopParticipant));
        }
        let progress = Progress::indeterminate("Bench", "startup");

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.to_async(&runtime).iter(|| async {
                registry.run_client_startup(&progress).await.expect("startup");
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_instance_resolution,
    bench_factory_first_resolution,
    bench_construct,
    bench_client_startup
);
criterion_main!(benches);

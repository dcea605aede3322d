// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_dispatch`.

use core::any::Any;
use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use understory_dispatch::{
    ClassId, ComponentController, Controller, ControllerClass, Dispatcher, ParamType,
    PropDefault, PropertyMap, Registry, RegistryBuilder, RenderNode, Value, coerce,
};

#[derive(Default)]
struct Widget {
    opacity: f32,
    width: i32,
    height: i32,
    color: i64,
    text: String,
}

#[derive(Default)]
struct Shadow {
    blur: f64,
    offset: f64,
}

#[derive(Default)]
struct Node {
    view: Option<Widget>,
    shadow: Option<Shadow>,
}

impl RenderNode for Node {
    fn create_view(&mut self, force: bool) -> Option<&mut dyn Any> {
        if force && self.view.is_none() {
            self.view = Some(Widget::default());
        }
        self.view.as_mut().map(|w| w as &mut dyn Any)
    }

    fn ensure_component(&mut self, kind: ClassId) -> Option<&mut dyn Any> {
        if kind != Effects::CLASS.id() {
            return None;
        }
        let shadow: &mut dyn Any = self.shadow.get_or_insert_with(Shadow::default);
        Some(shadow)
    }
}

#[derive(Default)]
struct Effects;

impl ComponentController for Effects {
    const CLASS: ControllerClass = ControllerClass::new::<Self>("Effects", |set| {
        set.prop("shadowBlur", PropDefault::Number(0.0), |s: &mut Shadow, v: f64| {
            s.blur = v;
        })
        .prop("shadowOffset", PropDefault::Number(0.0), |s: &mut Shadow, v: f64| {
            s.offset = v;
        });
    });
}

struct ViewController;
struct TextController;

const VIEW: ControllerClass = ControllerClass::new::<ViewController>("View", |set| {
    set.prop("opacity", PropDefault::Number(1.0), |w: &mut Widget, v: f32| w.opacity = v)
        .prop("width", PropDefault::Number(0.0), |w: &mut Widget, v: i32| w.width = v)
        .prop("height", PropDefault::Number(0.0), |w: &mut Widget, v: i32| w.height = v)
        .prop("backgroundColor", PropDefault::Number(0.0), |w: &mut Widget, v: i64| {
            w.color = v;
        });
});

const TEXT: ControllerClass = ControllerClass::new::<TextController>("Text", |set| {
    set.prop("text", PropDefault::String(""), |w: &mut Widget, v: String| w.text = v);
})
.extends(&VIEW);

impl Controller for TextController {
    fn class(&self) -> ControllerClass {
        TEXT
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(RegistryBuilder::new().component::<Effects>().build())
}

fn flat_props() -> PropertyMap {
    [
        ("opacity", Value::Float(0.5)),
        ("width", Value::Int(120)),
        ("height", Value::from("48")),
        ("backgroundColor", Value::Int(0xff33_6699)),
        ("text", Value::from("hello")),
        ("shadowBlur", Value::Float(4.0)),
        ("shadowOffset", Value::Null),
    ]
    .into_iter()
    .collect()
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/resolve");

    group.bench_function("cached", |b| {
        let registry = registry();
        registry.resolve(TEXT);
        b.iter(|| black_box(registry.resolve(black_box(TEXT))));
    });

    group.bench_function("cold", |b| {
        b.iter_batched(
            registry,
            |registry| black_box(registry.resolve(TEXT)),
            BatchSize::SmallInput,
        );
    });

    group.finish();

    let mut group = c.benchmark_group("dispatch/update");
    let flat = flat_props();
    let mut nested = PropertyMap::new();
    nested.insert("style", flat.clone());

    for (name, props) in [("flat", &flat), ("nested", &nested)] {
        group.bench_function(BenchmarkId::new(name, props.len()), |b| {
            let mut dispatcher = Dispatcher::new(registry());
            let mut node = Node::default();
            b.iter(|| {
                dispatcher.update_properties(
                    &mut node,
                    &mut TextController,
                    None,
                    Some(black_box(props)),
                    false,
                );
            });
        });
    }

    group.bench_function("skip_components", |b| {
        let mut dispatcher = Dispatcher::new(registry());
        let mut node = Node::default();
        b.iter(|| {
            dispatcher.update_properties(
                &mut node,
                &mut TextController,
                None,
                Some(black_box(&flat)),
                true,
            );
        });
    });

    group.finish();

    let mut group = c.benchmark_group("dispatch/coerce");
    for (name, value) in [
        ("int_to_f32", Value::Int(3)),
        ("float_to_i32", Value::Float(3.0)),
        ("string_to_f64", Value::from(" 3.25 ")),
    ] {
        let param = if name.ends_with("i32") {
            ParamType::I32
        } else if name.ends_with("f32") {
            ParamType::F32
        } else {
            ParamType::F64
        };
        group.bench_function(name, |b| {
            b.iter(|| black_box(coerce(param, black_box(&value))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);

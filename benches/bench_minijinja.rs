#![allow(
    clippy::unwrap_used,
    clippy::tests_outside_test_module,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use minijinja::Environment;

mod utils;

const LAYOUT: &str = "<html>
<head><title>{% block title %}Profile{% endblock %}</title></head>
<body>
{% block content %}{% endblock %}
</body>
</html>
";

const PROFILE: &str = "{% extends \"layout\" %}
{% block title %}{{ user.name }}'s profile{% endblock %}
{% block content %}
<h1>{{ user.name }}</h1>
{% if show_details %}
<p>Age: {{ user.age }}</p>
{% if user.active %}<p>Active</p>{% else %}<p>Inactive</p>{% endif %}
{% endif %}
{% if has_access %}
<ul>
{% for item in items %}
  {% include \"item\" %}
{% endfor %}
</ul>
{% else %}<p>No access</p>{% endif %}
{% endblock %}
";

const ITEM: &str = "<li>{{ item.name }}: {{ item.value }}{% if item.special %} (special){% endif %}</li>\n";

fn minijinja_benchmark(c: &mut Criterion) {
    // Create the MiniJinja environment
    let mut env = Environment::new();
    env.add_template("layout", LAYOUT).unwrap();
    env.add_template("item", ITEM).unwrap();
    env.add_template("profile", PROFILE).unwrap();

    let contexts: Vec<serde_json::Value> = utils::generate_profiles(100)
        .iter()
        .map(utils::Profile::to_json)
        .collect();

    utils::print_binary_size("minijinja");

    // Setup benchmark group
    let mut group = c.benchmark_group("Template Rendering");
    group.sample_size(50);

    group.bench_function("minijinja_render", |b| {
        b.iter(|| {
            let template = env.get_template("profile").unwrap();
            for context in &contexts {
                black_box(template.render(context).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, minijinja_benchmark);
criterion_main!(benches);

#![allow(
    clippy::string_slice,
    clippy::tests_outside_test_module,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use handlebars::Handlebars;

mod utils;

const LAYOUT: &str = "<html>
<head><title>{{#> title}}Profile{{/title}}</title></head>
<body>
{{#> content}}{{/content}}
</body>
</html>
";

const PROFILE: &str = "{{#> layout}}
{{#*inline \"title\"}}{{user.name}}'s profile{{/inline}}
{{#*inline \"content\"}}
<h1>{{user.name}}</h1>
{{#if show_details}}
<p>Age: {{user.age}}</p>
{{#if user.active}}<p>Active</p>{{else}}<p>Inactive</p>{{/if}}
{{/if}}
{{#if has_access}}
<ul>
{{#each items}}
  {{> item}}
{{/each}}
</ul>
{{else}}<p>No access</p>{{/if}}
{{/inline}}
{{/layout}}
";

const ITEM: &str = "<li>{{name}}: {{value}}{{#if special}} (special){{/if}}</li>\n";

fn handlebars_benchmark(c: &mut Criterion) {
    // Create the Handlebars registry
    let mut handlebars = Handlebars::new();
    handlebars.register_template_string("layout", LAYOUT).unwrap();
    handlebars.register_template_string("item", ITEM).unwrap();
    handlebars
        .register_template_string("profile", PROFILE)
        .unwrap();

    let contexts: Vec<serde_json::Value> = utils::generate_profiles(100)
        .iter()
        .map(utils::Profile::to_json)
        .collect();

    utils::print_binary_size("handlebars");

    // Setup benchmark group
    let mut group = c.benchmark_group("Template Rendering");
    group.sample_size(50);

    group.bench_function("handlebars_render", |b| {
        b.iter(|| {
            for context in &contexts {
                black_box(handlebars.render("profile", context).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, handlebars_benchmark);
criterion_main!(benches);

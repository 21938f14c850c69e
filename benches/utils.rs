use rand::{Rng, SeedableRng, rngs::StdRng};
use stachetree::Value;

/// One profile page's worth of data, shared by every engine's bench.
pub struct Profile {
    name: String,
    age: i64,
    active: bool,
    show_details: bool,
    has_access: bool,
    items: Vec<Item>,
}

struct Item {
    name: String,
    value: i64,
    special: bool,
}

impl Profile {
    fn random(rng: &mut StdRng) -> Self {
        let items = (0..rng.random_range(3..10))
            .map(|_| Item {
                name: random_word(rng, 3, 8),
                value: rng.random_range(10..1000),
                special: rng.random_bool(0.3),
            })
            .collect();

        Self {
            name: random_word(rng, 5, 10),
            age: rng.random_range(18..80),
            active: rng.random_bool(0.7),
            show_details: rng.random_bool(0.8),
            has_access: rng.random_bool(0.6),
            items,
        }
    }

    /// Render data for stachetree, with an `upper` section lambda.
    #[allow(dead_code, reason = "only the stachetree bench renders a Value")]
    pub fn to_value(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| {
                Value::map([
                    ("name", Value::from(item.name.as_str())),
                    ("value", Value::Int(item.value)),
                    ("special", Value::Bool(item.special)),
                ])
            })
            .collect();

        Value::map([
            (
                "user",
                Value::map([
                    ("name", Value::from(self.name.as_str())),
                    ("age", Value::Int(self.age)),
                    ("active", Value::Bool(self.active)),
                ]),
            ),
            ("items", Value::from(items)),
            ("show_details", Value::Bool(self.show_details)),
            ("has_access", Value::Bool(self.has_access)),
            (
                "upper",
                Value::lambda(|text| Ok(text.to_uppercase())),
            ),
        ])
    }

    /// The same data as JSON, for the engines that take serde values.
    #[allow(dead_code, reason = "the stachetree bench does not use JSON")]
    pub fn to_json(&self) -> serde_json::Value {
        let items: Vec<serde_json::Value> = self
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "name": item.name,
                    "value": item.value,
                    "special": item.special,
                })
            })
            .collect();

        serde_json::json!({
            "user": {
                "name": self.name,
                "age": self.age,
                "active": self.active,
            },
            "items": items,
            "show_details": self.show_details,
            "has_access": self.has_access,
        })
    }
}

/// `n` profiles from a fixed seed, so every engine renders the same pages.
pub fn generate_profiles(n: usize) -> Vec<Profile> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| Profile::random(&mut rng)).collect()
}

fn random_word(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let len = rng.random_range(min_len..=max_len);
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Prints the size of the running bench binary, labelled with `engine`.
pub fn print_binary_size(engine: &str) {
    let binary_path = std::env::current_exe().unwrap();
    let size_bytes = std::fs::metadata(&binary_path).unwrap().len();
    let size_kb = size_bytes as f64 / 1024.0;

    println!(
        "{engine}: {:.2} MB ({size_kb:.2} KB, {size_bytes} bytes) at {}",
        size_kb / 1024.0,
        binary_path.display()
    );
}

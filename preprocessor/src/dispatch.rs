//! Entry point for the compiled meta evaluator
//!
//! Sources that define meta-class generators are compiled into the evaluator
//! itself. The entry-point source of that build receives a `main` that maps
//! generator names to functions and answers the three protocol commands.
//! Decoding a class description and framing the reply are left to
//! `meta::evaluate` from the meta header.

use indexmap::IndexSet;

/// Protocol key of a generator: its unqualified name
pub fn generator_key(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

/// `main` dispatching commands 1, 2 and 3 to the given generators
pub fn generate_dispatch(generators: &IndexSet<String>) -> String {
    let mut out = String::new();
    out.push_str("int main() {\n");
    out.push_str(
        "  const std::unordered_map<std::string, void (*)(meta::type, const meta::type)> funs{\n",
    );
    for qualified in generators {
        out.push_str(&format!(
            "    {{\"{}\", &{}}},\n",
            generator_key(qualified),
            qualified
        ));
    }
    out.push_str("  };\n");
    out.push_str(
        "  int command = 0;
  while (std::cin >> command) {
    switch (command) {
    case 1:
      std::cout << funs.size() << '\\n';
      for (const auto& entry : funs) {
        std::cout << entry.first << '\\n';
      }
      std::cout.flush();
      break;
    case 2: {
      std::string generator;
      std::cin >> generator;
      meta::evaluate(std::cin, std::cout, funs.at(generator));
      break;
    }
    case 3:
      return 0;
    default:
      return 1;
    }
  }
  return 0;
}
",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_maps_unqualified_names() {
        let generators: IndexSet<String> =
            ["interface", "shapes::value"].iter().map(|s| s.to_string()).collect();
        let text = generate_dispatch(&generators);
        assert!(text.starts_with("int main() {\n"));
        assert!(text.contains("    {\"interface\", &interface},\n"));
        assert!(text.contains("    {\"value\", &shapes::value},\n"));
        assert!(text.contains("case 3:\n      return 0;"));
        assert!(text.contains("std::cout << funs.size() << '\\n';"));
    }
}

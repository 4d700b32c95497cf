use regex::Regex;

type ParamConverter<R> = Box<dyn Fn(Vec<String>) -> Option<R> + Send + Sync>;

struct RouteEntry<R> {
    pattern: Regex,
    converter: ParamConverter<R>,
}

/// Ordered list of regex routes. The first pattern matching the path wins;
/// its captured groups are handed to the converter.
pub struct RouteParser<R> {
    routes: Vec<RouteEntry<R>>,
}

impl<R> Default for RouteParser<R> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<R> RouteParser<R> {
    pub fn add_route<F>(&mut self, pattern: &str, converter: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_route_with_params(pattern, move |_| Some(converter()));
    }

    pub fn add_route_with_params<F>(&mut self, pattern: &str, converter: F)
    where
        F: Fn(Vec<String>) -> Option<R> + Send + Sync + 'static,
    {
        let pattern = Regex::new(pattern).expect("Invalid route pattern");
        self.routes.push(RouteEntry {
            pattern,
            converter: Box::new(converter),
        });
    }

    pub fn test(&self, path: &str) -> Option<R> {
        for entry in &self.routes {
            if let Some(captures) = entry.pattern.captures(path) {
                let params = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str().to_string())
                    .collect();
                if let Some(route) = (entry.converter)(params) {
                    return Some(route);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum TestRoute {
        Root,
        Item { id: i32 },
    }

    fn make_parser() -> RouteParser<TestRoute> {
        let mut parser: RouteParser<TestRoute> = Default::default();
        parser.add_route(r"^/root$", || TestRoute::Root);
        parser.add_route_with_params(r"^/items/(\d+)$", |params| {
            params
                .get(0)
                .and_then(|string_id| string_id.parse().ok())
                .map(|id| TestRoute::Item { id })
        });
        parser
    }

    #[test]
    fn matches_static_route() {
        assert_eq!(make_parser().test("/root"), Some(TestRoute::Root));
    }

    #[test]
    fn extracts_params() {
        assert_eq!(
            make_parser().test("/items/42"),
            Some(TestRoute::Item { id: 42 })
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_paths() {
        let parser = make_parser();
        assert_eq!(parser.test("/nope"), None);
        assert_eq!(parser.test("/items/abc"), None);
    }
}

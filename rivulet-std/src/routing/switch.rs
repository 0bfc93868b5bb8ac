//! First-match routing of one event to many targets.
//!
//! ```rust,ignore
//! let routes = Switch::new(&requests)
//!     .case("read", |r: &Request| r.method == "GET", |r| r.path.clone(), &reads)
//!     .case("write", |r| r.method == "POST", |r| r.body.clone(), &writes)
//!     .default(|r| r.clone(), &rejected);
//! ```
//!
//! Every payload of the source is tagged once with the index of the first
//! case whose predicate accepts it. Each case is a `filter_map` edge on the
//! tagged event followed by a forward into its target, so a case added
//! later applies to every later payload.

use rivulet_core::{Event, Source, Subscription, Target, Unit, Value, forward};
use std::sync::{Arc, Mutex, PoisonError};

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct Case<T> {
    name: String,
    predicate: Predicate<T>,
}

impl<T> Clone for Case<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

/// A payload tagged with the case it matched.
#[derive(Clone)]
struct Routed<T> {
    case: Option<usize>,
    payload: T,
}

type Cases<T> = Arc<Mutex<Vec<Case<T>>>>;

fn snapshot<T>(cases: &Cases<T>) -> Vec<Case<T>> {
    cases.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Routes every payload of a source to the first case that accepts it.
pub struct Switch<T> {
    dispatch: Event<Routed<T>>,
    cases: Cases<T>,
    subscriptions: Vec<Subscription>,
}

impl<T: Value> Switch<T> {
    /// Start routing the payloads of `source`.
    pub fn new(source: &impl Source<T>) -> Self {
        let entry = source.kernel().create_event::<T>();
        let inbound = forward(source, &entry);
        let cases: Cases<T> = Arc::new(Mutex::new(Vec::new()));
        let lookup = cases.clone();
        let dispatch = entry.map(move |payload: &T| Routed {
            case: snapshot(&lookup)
                .iter()
                .position(|case| (case.predicate)(payload)),
            payload: payload.clone(),
        });
        Self {
            dispatch,
            cases,
            subscriptions: vec![inbound],
        }
    }

    /// Add a case. Cases are tried in the order they were added.
    pub fn case<U, P, F>(
        mut self,
        name: impl Into<String>,
        predicate: P,
        map: F,
        target: &impl Target<U>,
    ) -> Self
    where
        U: Value,
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let index = {
            let mut cases = self.cases.lock().unwrap_or_else(PoisonError::into_inner);
            cases.push(Case {
                name: name.into(),
                predicate: Arc::new(predicate),
            });
            cases.len() - 1
        };
        let branch = self
            .dispatch
            .filter_map(move |routed: &Routed<T>| {
                (routed.case == Some(index)).then(|| map(&routed.payload))
            });
        self.subscriptions.push(forward(&branch, target));
        self
    }

    /// Receive every payload no case accepted.
    pub fn default<U, F>(mut self, map: F, target: &impl Target<U>) -> Self
    where
        U: Value,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let branch = self
            .dispatch
            .filter_map(move |routed: &Routed<T>| routed.case.is_none().then(|| map(&routed.payload)));
        self.subscriptions.push(forward(&branch, target));
        self
    }

    /// Fired with the name of the matching case, or `None` for the default.
    pub fn matched(&self) -> Event<Option<String>> {
        let cases = self.cases.clone();
        self.dispatch.map(move |routed: &Routed<T>| {
            routed
                .case
                .and_then(|index| snapshot(&cases).get(index).map(|case| case.name.clone()))
        })
    }

    /// Names of the cases, in matching order.
    pub fn case_names(&self) -> Vec<String> {
        snapshot(&self.cases).into_iter().map(|case| case.name).collect()
    }

    /// Stop routing: detach the source and every case target.
    pub fn unsubscribe(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_core::Kernel;

    #[derive(Clone, Debug, PartialEq)]
    enum Shape {
        Circle(f64),
        Square(f64),
        Line,
    }

    #[test]
    fn first_matching_case_wins() {
        let kernel = Kernel::new();
        let shapes = kernel.create_event::<Shape>();
        let radii = kernel.create_store(Vec::<f64>::new());
        let sides = kernel.create_store(Vec::<f64>::new());
        let radius = kernel.create_event::<f64>();
        let side = kernel.create_event::<f64>();
        let other = kernel.create_event::<Shape>();
        radii.on(&radius, |all, r| [all.as_slice(), &[*r]].concat());
        sides.on(&side, |all, s| [all.as_slice(), &[*s]].concat());
        let leftovers = kernel.create_store(0usize);
        leftovers.on(&other, |n, _| n + 1);

        let switch = Switch::new(&shapes)
            .case(
                "circle",
                |s| matches!(s, Shape::Circle(_)),
                |s| match s {
                    Shape::Circle(r) => *r,
                    _ => 0.0,
                },
                &radius,
            )
            .case(
                "anything-with-size",
                |s| !matches!(s, Shape::Line),
                |s| match s {
                    Shape::Square(x) | Shape::Circle(x) => *x,
                    Shape::Line => 0.0,
                },
                &side,
            )
            .default(Shape::clone, &other);

        shapes.trigger(Shape::Circle(1.0));
        shapes.trigger(Shape::Square(2.0));
        shapes.trigger(Shape::Line);

        assert_eq!(radii.get_state(), vec![1.0]);
        assert_eq!(sides.get_state(), vec![2.0]);
        assert_eq!(leftovers.get_state(), 1);
        assert_eq!(switch.case_names(), vec!["circle", "anything-with-size"]);
    }

    #[test]
    fn matched_reports_the_case_name() {
        let kernel = Kernel::new();
        let numbers = kernel.create_event::<i32>();
        let sink = kernel.create_event::<i32>();
        let switch = Switch::new(&numbers).case("even", |n| n % 2 == 0, |n| *n, &sink);
        let names = kernel.create_store(Vec::<Option<String>>::new());
        names.on(&switch.matched(), |all, name| {
            let mut all = all.clone();
            all.push(name.clone());
            all
        });

        numbers.trigger(2);
        numbers.trigger(3);
        assert_eq!(names.get_state(), vec![Some("even".to_string()), None]);

        switch.unsubscribe();
        numbers.trigger(4);
        assert_eq!(names.get_state().len(), 2);
    }
}

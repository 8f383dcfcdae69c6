use crate::resources::common;
use crate::resources::SynthesisError;
use crds::Route;
use kube::ResourceExt;

/// Destination weights are percentages of the route's traffic.
pub const EXPECTED_WEIGHT_SUM: i32 = 100;

/// Every route sharing a hostname must agree on whether the domain is
/// internal and must live in the same namespace as the first route.
pub fn validate_routes_for_fqdn(routes: &[&Route]) -> Result<(), SynthesisError> {
    let Some(first) = routes.first() else {
        return Ok(());
    };

    for route in routes {
        if first.spec.domain.internal != route.spec.domain.internal {
            return Err(SynthesisError::InternalMismatch {
                first: first.name_any(),
                other: route.name_any(),
            });
        }
        if first.namespace() != route.namespace() {
            return Err(SynthesisError::NamespaceMismatch {
                first: first.name_any(),
                other: route.name_any(),
            });
        }
    }
    Ok(())
}

pub fn validate_weights(route: &Route, require_sum: bool) -> Result<(), SynthesisError> {
    let destinations: Vec<_> = common::materialized(route).collect();
    let weighted = destinations.iter().filter(|d| d.weight.is_some()).count();

    if weighted != 0 && weighted != destinations.len() {
        return Err(SynthesisError::PartialWeights {
            route: route.name_any(),
        });
    }

    let sum: i64 = destinations
        .iter()
        .filter_map(|d| d.weight)
        .map(i64::from)
        .sum();
    if require_sum && weighted != 0 && sum != i64::from(EXPECTED_WEIGHT_SUM) {
        return Err(SynthesisError::WeightSum {
            route: route.name_any(),
        });
    }
    Ok(())
}

/// Splits the expected sum evenly across `n` destinations. The remainder
/// of the integer division goes to the first destination so the total is
/// always exactly the expected sum.
pub fn infer_weights(n: usize) -> Option<Vec<i32>> {
    let count = i32::try_from(n).ok().filter(|count| *count > 0)?;
    let weight = EXPECTED_WEIGHT_SUM / count;
    let mut weights = vec![weight; n];
    weights[0] += EXPECTED_WEIGHT_SUM - count * weight;
    Some(weights)
}

/// Validated weights for each materialized destination of `route`, in
/// destination order.
pub fn resolve_weights(route: &Route, require_sum: bool) -> Result<Vec<i32>, SynthesisError> {
    validate_weights(route, require_sum)?;

    let destinations: Vec<_> = common::materialized(route).collect();
    if destinations.iter().all(|d| d.weight.is_some()) && !destinations.is_empty() {
        return Ok(destinations.iter().filter_map(|d| d.weight).collect());
    }

    infer_weights(destinations.len()).ok_or_else(|| SynthesisError::NoDestinations {
        route: route.name_any(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::tests::{destination, route};

    #[test]
    fn infers_even_split_with_remainder_on_first() {
        assert_eq!(infer_weights(1), Some(vec![100]));
        assert_eq!(infer_weights(2), Some(vec![50, 50]));
        assert_eq!(infer_weights(3), Some(vec![34, 33, 33]));
        assert_eq!(infer_weights(0), None);
    }

    #[test]
    fn inferred_weights_are_conserved_and_balanced() {
        for n in 1..=150 {
            let weights = infer_weights(n).unwrap();
            assert_eq!(weights.iter().sum::<i32>(), EXPECTED_WEIGHT_SUM, "n = {}", n);

            let even = EXPECTED_WEIGHT_SUM / n as i32;
            assert!(weights[1..].iter().all(|w| *w == even));
            assert_eq!(weights[0] - even, EXPECTED_WEIGHT_SUM % n as i32);
        }
    }

    #[test]
    fn rejects_partial_weights() {
        let r = route(
            "r1",
            "h",
            "d.com",
            "",
            vec![destination("a", 8080, Some(50)), destination("b", 8080, None)],
        );
        assert_eq!(
            validate_weights(&r, false),
            Err(SynthesisError::PartialWeights { route: "r1".into() })
        );
        assert_eq!(
            SynthesisError::PartialWeights { route: "r1".into() }.to_string(),
            "invalid destinations for route r1: weights must be set on all or none"
        );
    }

    #[test]
    fn rejects_bad_sum_only_when_required() {
        let r = route(
            "r1",
            "h",
            "d.com",
            "",
            vec![destination("a", 8080, Some(20)), destination("b", 8080, Some(30))],
        );
        assert_eq!(
            validate_weights(&r, true),
            Err(SynthesisError::WeightSum { route: "r1".into() })
        );
        assert_eq!(validate_weights(&r, false), Ok(()));
        assert_eq!(resolve_weights(&r, false), Ok(vec![20, 30]));
    }

    #[test]
    fn resolves_explicit_and_inferred_weights() {
        let explicit = route(
            "r1",
            "h",
            "d.com",
            "",
            vec![destination("a", 8080, Some(80)), destination("b", 8080, Some(20))],
        );
        assert_eq!(resolve_weights(&explicit, true), Ok(vec![80, 20]));

        let inferred = route(
            "r2",
            "h",
            "d.com",
            "",
            vec![
                destination("a", 8080, None),
                destination("b", 8080, None),
                destination("c", 8080, None),
            ],
        );
        assert_eq!(resolve_weights(&inferred, true), Ok(vec![34, 33, 33]));
    }

    #[test]
    fn destinations_without_a_port_carry_no_weight() {
        let mut pending = destination("b", 8080, None);
        pending.port = None;
        let inferred = route("r1", "h", "d.com", "", vec![destination("a", 8080, None), pending]);
        assert_eq!(resolve_weights(&inferred, true), Ok(vec![100]));

        let mut pending = destination("b", 8080, Some(40));
        pending.port = None;
        let explicit = route(
            "r2",
            "h",
            "d.com",
            "",
            vec![destination("a", 8080, Some(60)), pending],
        );
        assert_eq!(
            resolve_weights(&explicit, true),
            Err(SynthesisError::WeightSum { route: "r2".into() })
        );
        assert_eq!(resolve_weights(&explicit, false), Ok(vec![60]));
    }

    #[test]
    fn empty_destinations_are_an_internal_error() {
        let r = route("r1", "h", "d.com", "", vec![]);
        assert_eq!(
            resolve_weights(&r, true),
            Err(SynthesisError::NoDestinations { route: "r1".into() })
        );
    }

    #[test]
    fn detects_internal_and_namespace_mismatch() {
        let a = route("r1", "h", "d.com", "", vec![]);
        let mut b = route("r2", "h", "d.com", "/p", vec![]);
        b.spec.domain.internal = true;
        assert_eq!(
            validate_routes_for_fqdn(&[&a, &b]),
            Err(SynthesisError::InternalMismatch {
                first: "r1".into(),
                other: "r2".into()
            })
        );

        let mut c = route("r3", "h", "d.com", "/q", vec![]);
        c.metadata.namespace = Some("elsewhere".into());
        assert_eq!(
            validate_routes_for_fqdn(&[&a, &c]),
            Err(SynthesisError::NamespaceMismatch {
                first: "r1".into(),
                other: "r3".into()
            })
        );

        assert_eq!(validate_routes_for_fqdn(&[&a]), Ok(()));
    }
}

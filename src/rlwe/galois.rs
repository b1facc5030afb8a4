//! Galois elements for R = Z[X]/(X^d + 1)
//!
//! Galois automorphisms τ_g: R → R are ring automorphisms defined by
//! τ_g(X) = X^g for g ∈ Z_{2d}^*. The Galois group is isomorphic to
//! Z_{d/2} × Z_2. The polynomial map itself is
//! [`RnsPoly::automorphism`](crate::math::RnsPoly::automorphism).

/// Get the two generators for the Galois group (Z/2dZ)^*
///
/// - g1 = 3 generates the cyclic subgroup of order d/2
/// - g2 = 2d - 1 is the "negation" automorphism X → X^(-1)
pub fn galois_generators(d: usize) -> (usize, usize) {
    debug_assert!(d.is_power_of_two(), "d must be a power of 2");
    (3, 2 * d - 1)
}

/// Check if g is a valid Galois element (odd and below 2d)
///
/// For a power-of-two d every odd residue is coprime to 2d.
pub fn is_valid_galois_element(g: usize, d: usize) -> bool {
    g % 2 == 1 && g < 2 * d
}

/// Compose two automorphisms: τ_{g1} ∘ τ_{g2} = τ_{g1·g2 mod 2d}
pub fn compose_automorphisms(g1: usize, g2: usize, d: usize) -> usize {
    (g1 * g2) % (2 * d)
}

/// Compute the order of g in (Z/2dZ)^*
pub fn automorphism_order(g: usize, d: usize) -> Option<usize> {
    if !is_valid_galois_element(g, d) {
        return None;
    }
    let two_d = 2 * d;
    let mut val = g % two_d;
    let mut order = 1;
    while val != 1 {
        val = (val * g) % two_d;
        order += 1;
    }
    Some(order)
}

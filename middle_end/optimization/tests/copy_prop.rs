use super::super::copy_prop::{copy_prop, Config};
use super::{idempotent, optimizes_to};

fn optimizes_to_default(input: &str, expected: &str) {
    optimizes_to(input, expected, |p| copy_prop(p, &Config::default()));
}

fn optimizes_to_transitive(input: &str, expected: &str) {
    let config = Config {
        track_all_transitives: true,
    };
    optimizes_to(input, expected, |p| copy_prop(p, &config));
}

#[test]
fn simple_chain() {
    // the moves stay (no dead-code elimination here), but every later use
    // of the chain reads the original register
    optimizes_to_default(
        r#"
    fn test 3 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      v2 = $copy v1
      $ret v2
    }
    "#,
        r#"
    fn test 3 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      v2 = $copy v0
      $ret v0
    }
    "#,
    );
}

#[test]
fn delete_repeated_move() {
    // the first copy survives so the monitor operands below stay valid; the
    // second is a repeat of a fact that already holds and is deleted
    optimizes_to_default(
        r#"
    fn test 2 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      v1 = $copyobj v0
      $monitor_enter v1
      $monitor_exit v1
      $ret v1
    }
    "#,
        r#"
    fn test 2 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      $monitor_enter v1
      $monitor_exit v1
      $ret v0
    }
    "#,
    );
}

#[test]
fn no_remap_range() {
    // six argument registers exceed the fixed-width call encoding, so the
    // operand list will be lowered to range form and must stay untouched
    optimizes_to_default(
        r#"
    fn test 7 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      $invoke bar(v1, v2, v3, v4, v5, v6)
      $ret v1
    }
    "#,
        r#"
    fn test 7 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      $invoke bar(v1, v2, v3, v4, v5, v6)
      $ret v0
    }
    "#,
    );
}

#[test]
fn remap_at_range_limit() {
    // five arguments still fit the regular encoding; they are fair game
    optimizes_to_default(
        r#"
    fn test 6 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      $invoke bar(v1, v2, v3, v4, v5)
      $ret
    }
    "#,
        r#"
    fn test 6 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      $invoke bar(v0, v2, v3, v4, v5)
      $ret
    }
    "#,
    );
}

#[test]
fn delete_self_move() {
    optimizes_to_default(
        r#"
    fn test 2 {
    entry:
      v1 = $const 0
      v0 = $copy v0
      $ret
    }
    "#,
        r#"
    fn test 2 {
    entry:
      v1 = $const 0
      $ret
    }
    "#,
    );
}

#[test]
fn representative() {
    // all uses of the class read the earliest-defined member
    optimizes_to_default(
        r#"
    fn test 2 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      $invoke foo(v0)
      $invoke bar(v1)
      $ret
    }
    "#,
        r#"
    fn test 2 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      $invoke foo(v0)
      $invoke bar(v0)
      $ret
    }
    "#,
    );
}

#[test]
fn branch_condition_remapped() {
    optimizes_to_default(
        r#"
    fn test 2 {
    entry:
      v0 = $const 1
      v1 = $copy v0
      $branch v1 left right
    left:
      $ret
    right:
      $ret
    }
    "#,
        r#"
    fn test 2 {
    entry:
      v0 = $const 1
      v1 = $copy v0
      $branch v0 left right
    left:
      $ret
    right:
      $ret
    }
    "#,
    );
}

#[test]
fn clique_aliasing() {
    // with full transitive tracking the redefinition of v1 does not break
    // the v0 == v2 fact, so the final copy is provably redundant
    optimizes_to_transitive(
        r#"
    fn test 4 {
    entry:
      v1 = $copy v2
      v0 = $copy v1
      v1 = $copy v3
      v0 = $copy v2
      $ret
    }
    "#,
        r#"
    fn test 4 {
    entry:
      v1 = $copy v2
      v0 = $copy v1
      v1 = $copy v3
      $ret
    }
    "#,
    );
}

#[test]
fn no_clique_aliasing_by_default() {
    // without the flag, redefining the intermediate v1 severs the chain, so
    // nothing is known about v0 == v2 and nothing changes
    let input = r#"
    fn test 4 {
    entry:
      v1 = $copy v2
      v0 = $copy v1
      v1 = $copy v3
      v0 = $copy v2
      $ret
    }
    "#;
    optimizes_to_default(input, input);
}

#[test]
fn loop_no_change() {
    // an increment loop carries no copies; the pass must leave it alone
    let input = r#"
    fn test 3 {
    entry:
      v0 = $const 0
      v1 = $const 10
      $jump head
    head:
      v2 = $cmp eq v0 v1
      $branch v2 end body
    body:
      v0 = $arith add v0 1
      $jump head
    end:
      $ret
    }
    "#;
    optimizes_to_default(input, input);
}

#[test]
fn loop_invalidates_alias() {
    // v0 == v1 holds on entry to the loop but not around the back edge,
    // because the body redefines v0; the meet at the header must drop the
    // fact and nothing may be rewritten
    let input = r#"
    fn test 2 {
    entry:
      v1 = $const 0
      v0 = $copy v1
      $jump head
    head:
      $branch v0 body end
    body:
      v0 = $arith add v0 1
      $jump head
    end:
      $ret v0
    }
    "#;
    optimizes_to_default(input, input);
}

#[test]
fn branch_no_change() {
    // the two arms establish different facts, so their intersection at the
    // join is empty and the final copy stays
    let input = r#"
    fn test 4 {
    entry:
      $branch v0 left right
    left:
      v1 = $copy v2
      $jump end
    right:
      v3 = $copy v2
      $jump end
    end:
      v1 = $copy v3
      $ret
    }
    "#;
    optimizes_to_default(input, input);
}

#[test]
fn intersect_at_join() {
    // both arms establish v1 == v2, so the copy after the join is redundant
    optimizes_to_default(
        r#"
    fn test 4 {
    entry:
      $branch v0 left right
    left:
      v1 = $copy v2
      $jump end
    right:
      v1 = $copy v2
      $jump end
    end:
      v1 = $copy v2
      $ret
    }
    "#,
        r#"
    fn test 4 {
    entry:
      $branch v0 left right
    left:
      v1 = $copy v2
      $jump end
    right:
      v1 = $copy v2
      $jump end
    end:
      $ret
    }
    "#,
    );
}

#[test]
fn rewriting_restores_a_join_fact() {
    // collapsing the left arm's chain onto v0 links v2 directly to v0, so
    // the redefinition of the intermediate v1 no longer severs the fact;
    // the pass repeats until the join sees v0 == v2 on both arms and the
    // return reads v0
    optimizes_to_default(
        r#"
    fn test 4 {
    entry:
      v0 = $const 0
      $branch v3 left right
    left:
      v1 = $copy v0
      v2 = $copy v1
      v1 = $const 9
      $jump end
    right:
      v2 = $copy v0
      v1 = $const 9
      $jump end
    end:
      $ret v2
    }
    "#,
        r#"
    fn test 4 {
    entry:
      v0 = $const 0
      $branch v3 left right
    left:
      v1 = $copy v0
      v2 = $copy v0
      v1 = $const 9
      $jump end
    right:
      v2 = $copy v0
      v1 = $const 9
      $jump end
    end:
      $ret v0
    }
    "#,
    );
}

#[test]
fn multiple_functions() {
    optimizes_to_default(
        r#"
    fn main 2 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      $ret v1
    }

    fn other 1 {
    entry:
      v0 = $copy v0
      $ret
    }
    "#,
        r#"
    fn main 2 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      $ret v0
    }

    fn other 1 {
    entry:
      $ret
    }
    "#,
    );
}

#[test]
fn idempotent_on_scenarios() {
    let default_pass = |p| copy_prop(p, &Config::default());
    let transitive = Config {
        track_all_transitives: true,
    };

    idempotent(
        r#"
    fn test 3 {
    entry:
      v0 = $const 0
      v1 = $copy v0
      v2 = $copy v1
      $ret v2
    }
    "#,
        default_pass,
    );

    idempotent(
        r#"
    fn test 2 {
    entry:
      v0 = $const 0
      v1 = $copyobj v0
      v1 = $copyobj v0
      $monitor_enter v1
      $monitor_exit v1
      $ret v1
    }
    "#,
        default_pass,
    );

    idempotent(
        r#"
    fn test 4 {
    entry:
      v1 = $copy v2
      v0 = $copy v1
      v1 = $copy v3
      v0 = $copy v2
      $ret
    }
    "#,
        |p| copy_prop(p, &transitive),
    );

    // a join whose incoming fact only appears after the arm's chain has
    // been collapsed onto its head
    idempotent(
        r#"
    fn test 4 {
    entry:
      v0 = $const 0
      $branch v3 left right
    left:
      v1 = $copy v0
      v2 = $copy v1
      v1 = $const 9
      $jump end
    right:
      v2 = $copy v0
      v1 = $const 9
      $jump end
    end:
      $ret v2
    }
    "#,
        default_pass,
    );

    // a back edge that kills the entry fact
    idempotent(
        r#"
    fn test 2 {
    entry:
      v1 = $const 0
      v0 = $copy v1
      $jump head
    head:
      $branch v0 body end
    body:
      v0 = $arith add v0 1
      $jump head
    end:
      $ret v0
    }
    "#,
        default_pass,
    );
}

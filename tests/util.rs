//! Shared test utilities for integration tests
//!
//! Code snippets and stub judges used across multiple test files.

#![allow(dead_code)]

use imm_metric::judge::MalformedOutput;
use imm_metric::{Judge, JudgeError, JudgeResult};

/// Python reference for the summation scenarios.
pub const SUM_SRC: &str = "def sum_to_n(n): s=0\nfor i in range(1,n+1): s+=i\nreturn s";

/// C-like accumulator loop with the same keywords and `+`.
///
/// The range-style loop keeps the operator set at `{+}` on both sides. A
/// counted `for` loop adds `<=` and lands exactly on op_jaccard = 0.5; see
/// [`COUNTED_SUM_TRG`].
pub const SUM_TRG: &str = "int sum_to_n(int n) {\n    int s = 0;\n    for (int i : range(1, n + 1)) {\n        s += i;\n    }\n    return s;\n}";

/// The same function with a conventional counted loop.
pub const COUNTED_SUM_TRG: &str = "int sum_to_n(int n) {\n    int s = 0;\n    for (int i = 1; i <= n; i++) {\n        s += i;\n    }\n    return s;\n}";

/// Same loop computing a factorial.
pub const PRODUCT_TRG: &str = "int sum_to_n(int n) {\n    int s = 1;\n    for (int i : range(1, n + 1)) {\n        s *= i;\n    }\n    return s;\n}";

/// Judge that always answers with a fixed score.
pub struct FixedJudge(pub f64);

impl Judge for FixedJudge
{
    fn name(&self) -> &str
    {
        "fixed"
    }

    fn judge(
        &self,
        _src: &str,
        _trg: &str,
    ) -> Result<JudgeResult, JudgeError>
    {
        Ok(JudgeResult::new(self.0))
    }
}

/// Judge whose reply never contains JSON.
pub struct MalformedJudge;

impl Judge for MalformedJudge
{
    fn name(&self) -> &str
    {
        "malformed"
    }

    fn judge(
        &self,
        _src: &str,
        _trg: &str,
    ) -> Result<JudgeResult, JudgeError>
    {
        Err(MalformedOutput::NoJsonObject { len: 12 }.into())
    }
}

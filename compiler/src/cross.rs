// cross.rs — Hand-off to an external shading-language cross-compiler
//
// The compiler's product is a binary module. Turning it into source for a
// specific graphics API is delegated to a `CrossCompiler`. With the `naga`
// feature enabled, `NagaCompiler` parses the module with naga's SPIR-V front
// end, validates it and writes WGSL.
//
// Preconditions: `words` is a complete module (header included).
// Postconditions: returns target-language source text.
// Failure modes: any front-end, validation or back-end failure becomes
//   `CompileError::CrossCompile` carrying the tool's message.
// Side effects: none.

use crate::diag::CompileError;
use crate::module::decode_header;

/// A backend turning an encoded module into shading-language source.
pub trait CrossCompiler {
    fn cross_compile(&self, words: &[u32], bound: u32) -> Result<String, CompileError>;
}

/// Reject modules whose header disagrees with the bound the caller expects.
pub fn check_module(words: &[u32], bound: u32) -> Result<(), CompileError> {
    let header = decode_header(words).map_err(|e| CompileError::CrossCompile(e.to_string()))?;
    if header.bound != bound {
        return Err(CompileError::CrossCompile(format!(
            "header bound {} does not match expected bound {bound}",
            header.bound
        )));
    }
    Ok(())
}

#[cfg(feature = "naga")]
pub use naga_backend::NagaCompiler;

#[cfg(feature = "naga")]
mod naga_backend {
    use super::{check_module, CrossCompiler};
    use crate::diag::CompileError;

    /// SPIR-V in, WGSL out.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NagaCompiler;

    impl CrossCompiler for NagaCompiler {
        fn cross_compile(&self, words: &[u32], bound: u32) -> Result<String, CompileError> {
            check_module(words, bound)?;
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            let module = naga::front::spv::parse_u8_slice(&bytes, &naga::front::spv::Options::default())
                .map_err(|e| CompileError::CrossCompile(format!("spv front end: {e}")))?;
            let info = naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::all(),
            )
            .validate(&module)
            .map_err(|e| CompileError::CrossCompile(format!("validation: {e}")))?;
            let source = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
                .map_err(|e| CompileError::CrossCompile(format!("wgsl back end: {e}")))?;
            tracing::debug!(bytes = source.len(), "cross-compiled to wgsl");
            Ok(source)
        }
    }
}

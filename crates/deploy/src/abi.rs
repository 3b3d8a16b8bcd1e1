//! ABI encoding of call and constructor argument trees.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Constructor, Function, Param},
    primitives::Bytes,
};
use anyhow::Context;
use futures::{FutureExt, future::BoxFuture};

use crate::{
    chain::ChainClient,
    project::{AbiArgument, AbiCall, Project},
    resolver::{Resolver, single_placeholder},
};

/// An argument tree with every placeholder resolved and nested calls encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    Value(String),
    List(Vec<ArgumentValue>),
}

/// Encode `call` as function call data (selector and arguments).
pub async fn encode_call<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    call: &AbiCall,
) -> anyhow::Result<Bytes> {
    let args = resolve_arguments(resolver, project, &call.args).await?;
    encode_function(&call.abi, &args)
}

/// Encode `constructor` as the argument blob appended to init code.
pub async fn encode_constructor<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    constructor: &AbiCall,
) -> anyhow::Result<Bytes> {
    let args = resolve_arguments(resolver, project, &constructor.args).await?;
    encode_constructor_args(&constructor.abi, &args)
}

async fn resolve_arguments<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    args: &[AbiArgument],
) -> anyhow::Result<Vec<ArgumentValue>> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(resolve_argument(resolver, project, arg).await?);
    }
    Ok(values)
}

fn resolve_argument<'b, C: ChainClient>(
    resolver: &'b Resolver<'_, C>,
    project: &'b Project,
    arg: &'b AbiArgument,
) -> BoxFuture<'b, anyhow::Result<ArgumentValue>> {
    async move {
        match arg {
            // A lone placeholder keeps its `0x` prefix so hex quantities stay numbers.
            AbiArgument::Value(value) => Ok(ArgumentValue::Value(match single_placeholder(value) {
                Some(reference) => resolver.resolve_reference(project, reference).await?,
                None => resolver.resolve_placeholders(project, value).await?,
            })),
            AbiArgument::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(resolve_argument(resolver, project, item).await?);
                }
                Ok(ArgumentValue::List(values))
            }
            AbiArgument::Call(call) => {
                let encoded = encode_call(resolver, project, call).await?;
                Ok(ArgumentValue::Value(encoded.to_string()))
            }
        }
    }
    .boxed()
}

/// Encode a call to the function described by a human-readable signature.
///
/// The `function` keyword is optional.
pub fn encode_function(signature: &str, args: &[ArgumentValue]) -> anyhow::Result<Bytes> {
    let signature = signature.trim();
    let signature = signature.strip_prefix("function ").unwrap_or(signature);
    let function = Function::parse(signature)
        .with_context(|| format!("Could not parse abi: {}", signature))?;

    let values = coerce_params(&function.inputs, args)
        .with_context(|| format!("Invalid arguments for {}", function.signature()))?;
    let data = function
        .abi_encode_input(&values)
        .with_context(|| format!("Failed to encode call to {}", function.signature()))?;

    Ok(data.into())
}

/// Encode constructor arguments for a signature like `constructor(address owner)`.
pub fn encode_constructor_args(
    signature: &str,
    args: &[ArgumentValue],
) -> anyhow::Result<Bytes> {
    let signature = signature.trim();
    let signature = if signature.starts_with("constructor") {
        signature.to_string()
    } else {
        format!("constructor{}", signature)
    };
    let constructor = Constructor::parse(&signature)
        .with_context(|| format!("Could not parse abi: {}", signature))?;

    let values = coerce_params(&constructor.inputs, args)
        .with_context(|| format!("Invalid constructor arguments for {}", signature))?;
    let data = constructor
        .abi_encode_input(&values)
        .context("Failed to encode constructor arguments")?;

    Ok(data.into())
}

fn coerce_params(
    params: &[Param],
    args: &[ArgumentValue],
) -> anyhow::Result<Vec<DynSolValue>> {
    if params.len() != args.len() {
        anyhow::bail!("Expected {} arguments, got {}", params.len(), args.len());
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .with_context(|| format!("Unsupported parameter type {}", param.ty))?;
            coerce(&ty, arg)
        })
        .collect()
}

fn coerce(ty: &DynSolType, arg: &ArgumentValue) -> anyhow::Result<DynSolValue> {
    match (ty, arg) {
        (DynSolType::Array(inner), ArgumentValue::List(items)) => Ok(DynSolValue::Array(
            items.iter().map(|item| coerce(inner, item)).collect::<anyhow::Result<_>>()?,
        )),
        (DynSolType::FixedArray(inner, len), ArgumentValue::List(items)) => {
            if items.len() != *len {
                anyhow::bail!("Expected {} items for {}, got {}", len, ty, items.len());
            }
            Ok(DynSolValue::FixedArray(
                items.iter().map(|item| coerce(inner, item)).collect::<anyhow::Result<_>>()?,
            ))
        }
        (DynSolType::Tuple(types), ArgumentValue::List(items)) => {
            if items.len() != types.len() {
                anyhow::bail!("Expected {} tuple fields, got {}", types.len(), items.len());
            }
            Ok(DynSolValue::Tuple(
                types
                    .iter()
                    .zip(items)
                    .map(|(ty, item)| coerce(ty, item))
                    .collect::<anyhow::Result<_>>()?,
            ))
        }
        (_, ArgumentValue::List(_)) => anyhow::bail!("List given for non-list type {}", ty),
        (
            DynSolType::Address | DynSolType::Bytes | DynSolType::FixedBytes(_),
            ArgumentValue::Value(value),
        ) if !value.starts_with("0x") => {
            // Placeholders drop the prefix.
            coerce_str(ty, &format!("0x{}", value))
        }
        (_, ArgumentValue::Value(value)) => coerce_str(ty, value),
    }
}

fn coerce_str(ty: &DynSolType, value: &str) -> anyhow::Result<DynSolValue> {
    ty.coerce_str(value)
        .with_context(|| format!("Cannot convert `{}` to {}", value, ty))
}

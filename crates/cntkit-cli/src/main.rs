mod cli;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command, ContextArgs};
use cntkit_core::{
    Action, ContextSettings, EvalRequest, ExecutionContext, ModelDescription, ResultSet,
};
use cntkit_deferred::DeferredContext;
use cntkit_local::{ContextRegistry, LocalContext, ProcessRunner};
use cntkit_output::{
    decode_sequences, parse_shape_spec, parse_shapes, parse_test_summary, resolve_shape,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).context("invalid log filter")?)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Decode { file, row_major } => {
            let text = read(&file)?;
            let results = decode_sequences(&text)
                .with_context(|| format!("failed to decode {}", file.display()))?;
            print_results(&results, row_major);
        }
        Command::Shapes { file } => {
            let shapes = parse_shapes(&read(&file)?)?;
            let mut names: Vec<_> = shapes.keys().collect();
            names.sort();
            for name in names {
                println!("{name} = {}", shapes[name]);
            }
        }
        Command::Summary { file } => {
            let summary = parse_test_summary(&read(&file)?)?;
            for (name, value) in summary.iter() {
                println!("{name} = {value}");
            }
        }
        Command::Resolve { shape, count } => {
            let spec = parse_shape_spec(&shape)?;
            let resolved = resolve_shape("<input>", &spec, count)?;
            println!("{} ({} elements)", resolved.shape, resolved.size);
        }
        Command::Train {
            context,
            model,
            inputs,
            keep_models,
            reader,
            sgd,
        } => {
            let model = ModelDescription::new(read(&model)?).with_inputs(inputs);
            let log = with_local(&context, |ctx| {
                ctx.train(&model, &sgd.params(), &reader.input_map(), !keep_models)
            })?;
            print!("{log}");
        }
        Command::Test { context, reader } => {
            let summary = with_local(&context, |ctx| ctx.test(&reader.input_map()))?;
            for (name, value) in summary.iter() {
                println!("{name} = {value}");
            }
        }
        Command::Write { context, reader } => {
            let log = with_local(&context, |ctx| ctx.write(&reader.input_map()))?;
            print!("{log}");
        }
        Command::Eval {
            context,
            model,
            node,
            inputs,
            gradient_of,
            reader,
        } => {
            let model = ModelDescription::new(read(&model)?).with_inputs(inputs);
            let request = match gradient_of {
                Some(input) => EvalRequest::backward(model, node, input),
                None => EvalRequest::forward(model, node),
            };
            let out = with_local(&context, |ctx| ctx.eval(&request, &reader.input_map()))?;
            print_results(&out.sequences, false);
            match out.resolve() {
                Ok(resolved) => println!("{} shape: {}", out.target, resolved.shape),
                Err(err) => warn!(node = %out.target, error = %err, "could not resolve node shape"),
            }
        }
        Command::Export {
            name,
            out,
            actions,
            device,
            precision,
            model,
            node,
            inputs,
            reader,
            sgd,
        } => {
            let mut ctx = DeferredContext::new(name, ContextSettings { device, precision });
            let model = model
                .as_deref()
                .map(read)
                .transpose()?
                .map(|text| ModelDescription::new(text).with_inputs(inputs));
            let reader = reader.input_map();

            for action in actions {
                match action {
                    Action::Train => {
                        let Some(model) = &model else {
                            bail!("train needs --model");
                        };
                        ctx.train(model, &sgd.params(), &reader, true)?;
                    }
                    Action::Test => ctx.test(&reader)?,
                    Action::Write => ctx.write(&reader)?,
                    Action::Eval => {
                        let (Some(model), Some(node)) = (&model, &node) else {
                            bail!("eval needs --model and --node");
                        };
                        let request = EvalRequest::forward(model.clone(), node.clone());
                        ctx.eval(&request, &reader)?;
                    }
                }
            }

            let path = ctx.export(&out)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Runs `f` on the named (or a fresh) local context. The staging directory
/// is torn down after success and left in place after a failure.
fn with_local<T>(
    args: &ContextArgs,
    f: impl FnOnce(&mut LocalContext) -> Result<T>,
) -> Result<T> {
    let settings = ContextSettings {
        device: args.device,
        precision: args.precision,
    };
    let mut reg = ContextRegistry::new(&args.root, settings, ProcessRunner::new(&args.cntk))
        .with_clean_up(!args.keep);

    let handle = match &args.context {
        Some(handle) => handle.clone(),
        None => reg.create_fresh()?,
    };
    let result = f(reg.get_or_create(&handle)?);

    match result {
        Ok(value) => {
            reg.remove(&handle)?;
            Ok(value)
        }
        Err(err) => {
            if let Some(ctx) = reg.release(&handle) {
                warn!(
                    context = %handle,
                    dir = %ctx.staging().dir().display(),
                    "keeping staging directory of failed run"
                );
            }
            Err(err)
        }
    }
}

fn print_results(results: &ResultSet, row_major: bool) {
    info!(
        sequences = results.len(),
        elements = results.element_count(),
        "decoded results"
    );
    for (i, seq) in results.iter().enumerate() {
        for (j, sample) in seq.iter().enumerate() {
            let data = if row_major {
                sample.to_row_major().data
            } else {
                sample.data.clone()
            };
            let values: Vec<String> = data.iter().map(f64::to_string).collect();
            println!("{i}\t{j}\t{}\t{}", sample.shape, values.join(" "));
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

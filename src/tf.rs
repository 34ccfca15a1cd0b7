use crate::config::Config;
use crate::model::{Classifier, ModelError};

#[cfg(feature = "tensorflow")]
pub fn load_classifier(config: &Config) -> Result<Box<dyn Classifier>, ModelError> {
    Ok(Box::new(backend::TfClassifier::new(config)?))
}

#[cfg(not(feature = "tensorflow"))]
pub fn load_classifier(_config: &Config) -> Result<Box<dyn Classifier>, ModelError> {
    Err(ModelError::Backend(
        "built without the `tensorflow` feature".to_string(),
    ))
}

#[cfg(feature = "tensorflow")]
mod backend {
    use std::fs;

    use tensorflow::{
        Graph, ImportGraphDefOptions, Operation, Session, SessionOptions, SessionRunArgs, Tensor,
    };

    use crate::config::{Config, TensorLayout};
    use crate::model::{Classifier, ModelError, CHANNELS, IMAGE_SIZE};

    fn backend_err(context: &str, err: impl std::fmt::Display) -> ModelError {
        ModelError::Backend(format!("{}: {}", context, err))
    }

    /// Frozen TensorFlow graph evaluated on the CPU session.
    pub struct TfClassifier {
        session: Session,
        graph: Graph,
        input_op: String,
        output_op: String,
        layout: TensorLayout,
    }

    impl TfClassifier {
        pub fn new(config: &Config) -> Result<Self, ModelError> {
            let model_bytes = fs::read(&config.model_path).map_err(|e| {
                backend_err(&format!("failed to read {}", config.model_path.display()), e)
            })?;

            let mut graph = Graph::new();
            graph
                .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
                .map_err(|e| backend_err("failed to import graph", e))?;

            let session = Session::new(&SessionOptions::new(), &graph)
                .map_err(|e| backend_err("failed to create session", e))?;

            let classifier = TfClassifier {
                session,
                graph,
                input_op: config.input_op.clone(),
                output_op: config.output_op.clone(),
                layout: config.input_layout,
            };
            // Fail at load time rather than on the first request.
            classifier.operation(&classifier.input_op)?;
            classifier.operation(&classifier.output_op)?;

            Ok(classifier)
        }

        fn operation(&self, name: &str) -> Result<Operation, ModelError> {
            self.graph
                .operation_by_name(name)
                .map_err(|e| backend_err(&format!("failed to retrieve operation '{}'", name), e))?
                .ok_or_else(|| {
                    ModelError::Backend(format!("operation '{}' not found in graph", name))
                })
        }

        fn dims(&self) -> [u64; 4] {
            let side = IMAGE_SIZE as u64;
            let channels = CHANNELS as u64;
            match self.layout {
                TensorLayout::Nchw => [1, channels, side, side],
                TensorLayout::Nhwc => [1, side, side, channels],
            }
        }
    }

    impl Classifier for TfClassifier {
        fn forward(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
            let mut tensor = Tensor::<f32>::new(&self.dims());
            if tensor.len() != input.len() {
                return Err(ModelError::Backend(format!(
                    "input has {} values, graph expects {}",
                    input.len(),
                    tensor.len()
                )));
            }
            tensor.copy_from_slice(input);

            let input_operation = self.operation(&self.input_op)?;
            let output_operation = self.operation(&self.output_op)?;

            let mut args = SessionRunArgs::new();
            args.add_feed(&input_operation, 0, &tensor);
            let output_token = args.request_fetch(&output_operation, 0);
            self.session
                .run(&mut args)
                .map_err(|e| backend_err("session run failed", e))?;

            let output: Tensor<f32> = args
                .fetch(output_token)
                .map_err(|e| backend_err("failed to fetch output", e))?;
            Ok(output.to_vec())
        }

        fn layout(&self) -> TensorLayout {
            self.layout
        }
    }
}

// Transform Registry
//
// Ordered list of passes. Materializing it for a build unit yields the host's
// three phase buckets, each in registration order.

use std::rc::Rc;

use ts::{CustomTransformers, Node, Result, TransformationContext, TransformerFactory};

use super::environment::{TransformEnvironment, TransformPhase, TransformUnit};
use super::pass::TransformPass;

#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    passes: Vec<TransformPass>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass. The same pass may be added more than once.
    pub fn add(&mut self, pass: TransformPass) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn passes(&self) -> &[TransformPass] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Passes declaring `phase`, in registration order.
    pub fn passes_for(&self, phase: TransformPhase) -> impl Iterator<Item = &TransformPass> + '_ {
        self.passes.iter().filter(move |pass| pass.declares(phase))
    }

    pub fn materialize(&self, unit: &TransformUnit) -> CustomTransformers {
        let unit = Rc::new(unit.clone());
        let bucket = |phase: TransformPhase| -> Vec<Box<dyn TransformerFactory>> {
            self.passes_for(phase)
                .map(|pass| {
                    Box::new(PassFactory {
                        pass: pass.clone(),
                        phase,
                        unit: unit.clone(),
                    }) as Box<dyn TransformerFactory>
                })
                .collect()
        };
        CustomTransformers {
            before: bucket(TransformPhase::Before),
            after: bucket(TransformPhase::After),
            after_declarations: bucket(TransformPhase::AfterDeclarations),
        }
    }
}

/// Host factory for one pass in one phase.
struct PassFactory {
    pass: TransformPass,
    phase: TransformPhase,
    unit: Rc<TransformUnit>,
}

impl TransformerFactory for PassFactory {
    fn create<'a>(&'a self, context: &'a TransformationContext<'a>) -> Box<dyn FnMut(Node) -> Result<Node> + 'a> {
        Box::new(move |root| {
            let env = TransformEnvironment::new(self.phase, *context, &self.unit);
            self.pass.transform(root, &env)
        })
    }
}

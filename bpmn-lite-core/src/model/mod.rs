pub mod definition;
pub mod node;
pub mod xml_parser;

pub use definition::{load_definition, BpmnParser, Definition, ParsedElement, ParsedTree, Process};
pub use node::{
    EventSubType, Flow, FlowKind, FormField, FormSpec, IoParameter, IoSource, IoSpec,
    LoopCharacteristics, Node, NodeKind, TimerSpec,
};

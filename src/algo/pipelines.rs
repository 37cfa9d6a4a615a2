use crate::proc::Pipe;

/// Anchor discovery, expansion, overlap resolution, alignment and filling
/// of uncovered regions, composed into one pipe over the `target` slot.
pub fn make_pre_pangenome() -> Pipe {
    let mut pipe = Pipe::new("MakePrePangenome");
    pipe.add(Box::new(super::AnchorFinder::new()), "");
    pipe.add(Box::new(super::Connector::new()), "");
    pipe.add(
        Box::new(super::FragmentsExpander::new()),
        "--max-overlap:=$EXPANDER_MAX_OVERLAP",
    );
    pipe.add(Box::new(super::Filter::new()), "");
    pipe.add(
        Box::new(super::OverlapsResolver2::new()),
        "target=target other=target",
    );
    pipe.add(Box::new(super::Filter::new()), "");
    pipe.add(
        Box::new(super::FragmentsExpander::new()),
        "--max-overlap:=$EXPANDER_MAX_OVERLAP",
    );
    pipe.add(
        Box::new(super::OverlapsResolver2::new()),
        "target=target other=target",
    );
    pipe.add(Box::new(super::Align::default()), "");
    pipe.add(Box::new(super::Filter::new()), "");
    pipe.add(Box::new(super::Rest::new()), "other=target");
    pipe
}

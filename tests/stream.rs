use std::io::Cursor;

use anyhow::Result;
use bamrec::cigar::parse_cigar;
use bamrec::tags::standard::{MD, NM, RG};
use bamrec::{BamRecord, RecordCodec, RecordReader, RecordWriter, ReferenceDictionary, Tag, TagType, Value};

fn reference_bases() -> Vec<u8> {
    b"CCTAGGCTAACCTAAACCCTAACCCTAACCCTAAGCCCTCACCTTTCCAACCCTAACCCTAACCCTCACCCCTAACCCTAAACCTAACCCAAACCCTAACCCAC"
        [..101]
        .to_vec()
}

fn build_records() -> Result<Vec<BamRecord>> {
    let dictionary = ["1", "2"].into_iter().collect::<ReferenceDictionary>().into_shared();
    let bases = reference_bases();
    let quals = vec![30u8; bases.len()];
    let cigar = parse_cigar("45M56S")?;

    let mut records = Vec::new();
    for (i, start) in [9997, 20_000, 35_123].into_iter().enumerate() {
        let name = format!("r{}", i + 1);
        let record = BamRecord::builder()
            .read_name(name.as_bytes())
            .flags(99)
            .reference_index(0)
            .alignment_start(start)
            .cigar(&cigar)
            .bases(&bases)
            .qualities(&quals)
            .mate_reference_index(0)
            .mate_alignment_start(start + 100)
            .template_len(205)
            .tag(RG, "grp1")
            .tag(NM, 0u8)
            .dictionary(dictionary.clone())
            .build()?;
        records.push(record);
    }
    Ok(records)
}

#[test]
fn test_decode_then_encode_is_byte_exact() -> Result<()> {
    let mut records = build_records()?;
    let mut writer = RecordWriter::new(Vec::new());
    for record in &mut records {
        writer.write_record(record)?;
    }
    assert_eq!(writer.num_records(), 3);
    let stream = writer.into_inner();

    let mut rewriter = RecordWriter::new(Vec::new());
    for record in RecordReader::new(Cursor::new(stream.as_slice())) {
        rewriter.write_record(&mut record?)?;
    }
    assert_eq!(rewriter.into_inner(), stream);
    Ok(())
}

#[test]
fn test_first_record_fields() -> Result<()> {
    let mut records = build_records()?;
    let mut stream = Vec::new();
    let codec = RecordCodec::builder()
        .dictionary(["1", "2"].into_iter().collect::<ReferenceDictionary>().into_shared())
        .build();
    codec.encode(&mut records[0], &mut stream)?;

    let record = codec.decode(&mut stream.as_slice())?.expect("one record");
    assert_eq!(record.read_name_str()?, "r1");
    assert_eq!(record.reference_name()?, "1");
    assert_eq!(record.alignment_start(), 9997);
    assert_eq!(record.alignment_end()?, Some(10041));
    assert_eq!(record.bin(), Some(bamrec::binning::reg2bin(9996, 10041)));
    assert_eq!(record.cigar_reference_length()?, 45);
    assert_eq!(record.read_bases(), reference_bases().as_slice());
    Ok(())
}

#[test]
fn test_edits_survive_a_round_trip() -> Result<()> {
    let mut records = build_records()?;
    let xa = Tag::try_from("XA")?;
    {
        let record = &mut records[1];
        record.set_read_name(b"renamed")?;
        record.set_cigar_string("50M51S")?;
        record.set_int_attribute(xa, 3)?;
        record.set_attribute_as(xa, TagType::Int8, Some(Value::UInt8(0x8F)))?;
        record.set_attribute(MD, Some(Value::from("50")))?;
        record.delete_attribute(NM)?;
        record.set_reference_name("2");
    }

    let mut writer = RecordWriter::new(Vec::new());
    for record in &mut records {
        writer.write_record(record)?;
    }
    let stream = writer.into_inner();

    let decoded = RecordReader::new(stream.as_slice()).collect::<Result<Vec<_>, _>>()?;
    let record = &decoded[1];
    assert_eq!(record.read_name(), b"renamed");
    assert_eq!(record.cigar_string()?, "50M51S");
    assert_eq!(record.reference_index(), 1);
    assert_eq!(record.alignment_end()?, Some(20_049));
    assert_eq!(record.bin(), Some(bamrec::binning::reg2bin(19_999, 20_049)));
    assert_eq!(record.int_attribute(xa)?, -113);
    assert_eq!(record.attribute_tags()?, [RG, xa, MD]);
    assert_eq!(decoded[2].read_name(), b"r3");
    Ok(())
}

#[test]
fn test_truncated_stream() -> Result<()> {
    let mut records = build_records()?;
    let mut writer = RecordWriter::new(Vec::new());
    for record in &mut records {
        writer.write_record(record)?;
    }
    let mut stream = writer.into_inner();
    stream.truncate(stream.len() - 10);

    let results: Vec<_> = RecordReader::new(stream.as_slice()).collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok() && results[1].is_ok());
    assert!(results[2].as_ref().unwrap_err().is_malformed());
    Ok(())
}
